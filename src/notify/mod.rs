//! Change detection and notification.

pub mod bus;
pub mod classify;

pub use bus::{ChangeBus, ChangeEvent, ChangeListener, ListenerId};

/// Sink for "something changed" signals raised by the tracked executor.
pub trait Notifier: Send + Sync {
    fn notify(&self, reason: &str);
}

/// Notifier that drops everything; used by maintenance commands.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _reason: &str) {}
}

//! Debounced change-notification bus.
//!
//! `notify` only enqueues a reason. A single background task collapses
//! every trigger arriving within the quiescence window into one
//! `ChangeEvent` carrying the last reason, then fans it out to the
//! registered listeners. Delivery is best-effort: no backlog, no replay.

use crate::errors::AppResult;
use crate::notify::Notifier;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub seq: u64,
    pub reason: String,
    pub at: DateTime<Utc>,
}

pub trait ChangeListener: Send + Sync {
    fn name(&self) -> &str {
        "listener"
    }

    fn on_change(&self, event: &ChangeEvent) -> AppResult<()>;
}

pub type ListenerId = u64;

type Registry = Arc<RwLock<BTreeMap<ListenerId, Arc<dyn ChangeListener>>>>;

pub struct ChangeBus {
    window: Duration,
    tx: mpsc::UnboundedSender<String>,
    listeners: Registry,
    next_id: AtomicU64,
    emitted: Arc<AtomicU64>,
}

impl ChangeBus {
    /// Create the bus and start its debounce task on the current runtime.
    pub fn spawn(window: Duration) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners: Registry = Arc::new(RwLock::new(BTreeMap::new()));
        let emitted = Arc::new(AtomicU64::new(0));

        tokio::spawn(debounce_loop(
            rx,
            window,
            Arc::clone(&listeners),
            Arc::clone(&emitted),
        ));

        Arc::new(Self {
            window,
            tx,
            listeners,
            next_id: AtomicU64::new(1),
            emitted,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.listeners.write() {
            map.insert(id, listener);
        }
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners
            .write()
            .map(|mut map| map.remove(&id).is_some())
            .unwrap_or(false)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Number of coalesced events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

impl Notifier for ChangeBus {
    fn notify(&self, reason: &str) {
        if self.tx.send(reason.to_string()).is_err() {
            debug!(reason, "change bus stopped, notification dropped");
        }
    }
}

async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    window: Duration,
    listeners: Registry,
    emitted: Arc<AtomicU64>,
) {
    let mut seq = 0u64;

    while let Some(first) = rx.recv().await {
        let mut reason = first;

        // Every trigger re-arms the timer; fire once the window stays quiet.
        loop {
            match tokio::time::timeout(window, rx.recv()).await {
                Ok(Some(next)) => reason = next,
                Ok(None) | Err(_) => break,
            }
        }

        seq += 1;
        emitted.store(seq, Ordering::Relaxed);
        let event = ChangeEvent {
            seq,
            reason,
            at: Utc::now(),
        };
        dispatch(&listeners, &event);
    }
}

fn dispatch(listeners: &Registry, event: &ChangeEvent) {
    let snapshot: Vec<Arc<dyn ChangeListener>> = match listeners.read() {
        Ok(map) => map.values().cloned().collect(),
        Err(_) => return,
    };

    for listener in snapshot {
        match catch_unwind(AssertUnwindSafe(|| listener.on_change(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(listener = listener.name(), error = %e, "change listener failed"),
            Err(_) => warn!(listener = listener.name(), "change listener panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ChangeEvent>>,
    }

    impl Recorder {
        fn reasons(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.reason.clone())
                .collect()
        }
    }

    impl ChangeListener for Recorder {
        fn on_change(&self, event: &ChangeEvent) -> AppResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Failing {
        calls: AtomicU64,
        panic: bool,
    }

    impl ChangeListener for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_change(&self, _event: &ChangeEvent) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.panic {
                panic!("listener blew up");
            }
            Err(AppError::Other("listener failed".into()))
        }
    }

    const WINDOW: Duration = Duration::from_millis(150);

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_event_with_last_reason() {
        let bus = ChangeBus::spawn(WINDOW);
        let rec = Arc::new(Recorder::default());
        bus.subscribe(rec.clone());

        bus.notify("insert a");
        bus.notify("update b");
        bus.notify("delete c");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rec.reasons().is_empty(), "fired before the window elapsed");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rec.reasons(), vec!["delete c".to_string()]);
        assert_eq!(bus.emitted(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_inside_window_rearms_timer() {
        let bus = ChangeBus::spawn(WINDOW);
        let rec = Arc::new(Recorder::default());
        bus.subscribe(rec.clone());

        bus.notify("first");
        tokio::time::sleep(Duration::from_millis(100)).await;
        bus.notify("second");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rec.reasons().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rec.reasons(), vec!["second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_bursts_emit_separately() {
        let bus = ChangeBus::spawn(WINDOW);
        let rec = Arc::new(Recorder::default());
        bus.subscribe(rec.clone());

        bus.notify("one");
        tokio::time::sleep(Duration::from_millis(300)).await;
        bus.notify("two");
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(rec.reasons(), vec!["one".to_string(), "two".to_string()]);
        let seqs: Vec<u64> = rec.events.lock().unwrap().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_listeners_are_isolated_and_stay_registered() {
        let bus = ChangeBus::spawn(WINDOW);
        let failing = Arc::new(Failing {
            calls: AtomicU64::new(0),
            panic: false,
        });
        let panicking = Arc::new(Failing {
            calls: AtomicU64::new(0),
            panic: true,
        });
        let rec = Arc::new(Recorder::default());
        bus.subscribe(failing.clone());
        bus.subscribe(panicking.clone());
        bus.subscribe(rec.clone());

        bus.notify("x");
        tokio::time::sleep(Duration::from_millis(300)).await;
        bus.notify("y");
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(failing.calls.load(Ordering::Relaxed), 2);
        assert_eq!(panicking.calls.load(Ordering::Relaxed), 2);
        assert_eq!(rec.reasons(), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(bus.listener_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribed_listener_receives_nothing() {
        let bus = ChangeBus::spawn(WINDOW);
        let rec = Arc::new(Recorder::default());
        let id = bus.subscribe(rec.clone());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.notify("z");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rec.reasons().is_empty());
        assert_eq!(bus.emitted(), 1);
    }
}

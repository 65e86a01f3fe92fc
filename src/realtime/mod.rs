//! Desktop realtime channel (`/ws/desktop`).

pub mod heartbeat;
pub mod hub;
pub mod messages;
pub mod reconnect;
pub mod session;

pub use hub::RealtimeHub;
pub use reconnect::{AUTH_REJECTED_CLOSE_CODE, ReconnectPolicy};

//! Liveness tracking for one connection.
//!
//! Each tick sends a ping. If the ping from the previous tick is still
//! unanswered, the connection is terminated instead.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    SendPing,
    Terminate,
}

#[derive(Debug, Default)]
pub struct Heartbeat {
    awaiting_pong: bool,
    pings_sent: u64,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self) -> HeartbeatAction {
        if self.awaiting_pong {
            return HeartbeatAction::Terminate;
        }
        self.awaiting_pong = true;
        self.pings_sent += 1;
        HeartbeatAction::SendPing
    }

    /// Protocol pong frame or JSON `pong` message.
    pub fn on_pong(&mut self) {
        self.awaiting_pong = false;
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting_pong
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answered_pings_keep_connection_alive() {
        let mut hb = Heartbeat::new();
        for _ in 0..5 {
            assert_eq!(hb.on_tick(), HeartbeatAction::SendPing);
            hb.on_pong();
        }
        assert_eq!(hb.pings_sent(), 5);
        assert!(!hb.is_awaiting());
    }

    #[test]
    fn unanswered_ping_terminates_on_next_tick() {
        let mut hb = Heartbeat::new();
        assert_eq!(hb.on_tick(), HeartbeatAction::SendPing);
        assert!(hb.is_awaiting());
        assert_eq!(hb.on_tick(), HeartbeatAction::Terminate);
    }

    #[test]
    fn late_pong_still_counts_before_tick() {
        let mut hb = Heartbeat::new();
        hb.on_tick();
        hb.on_pong();
        hb.on_pong();
        assert_eq!(hb.on_tick(), HeartbeatAction::SendPing);
    }
}

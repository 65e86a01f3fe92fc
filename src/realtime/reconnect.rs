//! Client-side reconnection policy for the desktop channel.
//!
//! Exponential backoff from `min` doubling to `max`, with symmetric jitter.
//! The attempt counter resets once a connection stayed open for the stable
//! window. An auth-rejected close never reconnects.

use std::time::{Duration, Instant};

/// Close code sent when `identify` conflicts with the authenticated user.
pub const AUTH_REJECTED_CLOSE_CODE: u16 = 4403;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub min: Duration,
    pub max: Duration,
    /// Fraction of the base delay, applied symmetrically.
    pub jitter: f64,
    pub stable_after: Duration,
    attempt: u32,
    opened_at: Option<Instant>,
    stopped: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            0.2,
            Duration::from_secs(60),
        )
    }
}

impl ReconnectPolicy {
    pub fn new(min: Duration, max: Duration, jitter: f64, stable_after: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            jitter: jitter.clamp(0.0, 1.0),
            stable_after,
            attempt: 0,
            opened_at: None,
            stopped: false,
        }
    }

    pub fn on_open(&mut self, now: Instant) {
        self.opened_at = Some(now);
    }

    /// Delay before the next attempt, or `None` when reconnecting is
    /// forbidden.
    pub fn on_close(&mut self, code: Option<u16>, now: Instant) -> Option<Duration> {
        self.on_close_with(code, now, rand::random::<f64>())
    }

    /// Same as `on_close` with an explicit jitter sample in `[0, 1)`.
    pub fn on_close_with(
        &mut self,
        code: Option<u16>,
        now: Instant,
        sample: f64,
    ) -> Option<Duration> {
        if code == Some(AUTH_REJECTED_CLOSE_CODE) {
            self.stopped = true;
        }
        if self.stopped {
            return None;
        }
        if let Some(opened) = self.opened_at.take()
            && now.saturating_duration_since(opened) >= self.stable_after
        {
            self.attempt = 0;
        }
        Some(self.next_delay_with(sample))
    }

    /// Un-jittered delay for the upcoming attempt.
    pub fn base_delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(16));
        self.min.saturating_mul(factor).min(self.max)
    }

    pub fn next_delay_with(&mut self, sample: f64) -> Duration {
        let base = self.base_delay();
        self.attempt = self.attempt.saturating_add(1);
        let spread = (sample.clamp(0.0, 1.0) * 2.0 - 1.0) * self.jitter;
        base.mul_f64(1.0 + spread)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(d: Duration) -> f64 {
        d.as_secs_f64()
    }

    #[test]
    fn auth_rejection_is_final() {
        let mut p = ReconnectPolicy::default();
        let now = Instant::now();
        assert_eq!(p.on_close(Some(AUTH_REJECTED_CLOSE_CODE), now), None);
        assert!(p.is_stopped());
        assert_eq!(p.on_close(Some(1006), now), None);
    }

    #[test]
    fn delays_double_up_to_ceiling() {
        let mut p = ReconnectPolicy::default();
        let now = Instant::now();
        let delays: Vec<f64> = (0..7)
            .map(|_| secs(p.on_close_with(Some(1006), now, 0.5).unwrap()))
            .collect();
        assert_eq!(delays, vec![1.0, 2.0, 4.0, 8.0, 16.0, 30.0, 30.0]);
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let now = Instant::now();
        for sample in [0.0, 0.25, 0.5, 0.75, 0.999] {
            let mut p = ReconnectPolicy::default();
            p.on_close_with(Some(1006), now, 0.5);
            let d = secs(p.on_close_with(Some(1006), now, sample).unwrap());
            assert!((1.6..=2.4).contains(&d), "delay {d} for sample {sample}");
        }
        // Random samples respect the same bounds.
        let mut p = ReconnectPolicy::default();
        for _ in 0..50 {
            let base = secs(p.base_delay());
            let d = secs(p.on_close(None, now).unwrap());
            assert!(d >= base * 0.8 - 1e-9 && d <= base * 1.2 + 1e-9);
        }
    }

    #[test]
    fn stable_connection_resets_backoff() {
        let mut p = ReconnectPolicy::default();
        let t0 = Instant::now();
        for _ in 0..4 {
            p.on_close_with(Some(1006), t0, 0.5);
        }
        assert_eq!(p.base_delay(), Duration::from_secs(16));

        // Short-lived connection: no reset.
        p.on_open(t0);
        let d = p.on_close_with(Some(1006), t0 + Duration::from_secs(5), 0.5);
        assert_eq!(d, Some(Duration::from_secs(16)));

        p.on_open(t0);
        let d = p.on_close_with(Some(1006), t0 + Duration::from_secs(61), 0.5);
        assert_eq!(d, Some(Duration::from_secs(1)));
    }
}

//! Reconnect backoff
//!
//! Delay for attempt `n` is `base * 2^n`, capped at `max`.

use std::time::Duration;

use crate::config::WebSocketConfig;

#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    /// 0 = unlimited
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            max_attempts,
            attempt: 0,
        }
    }

    pub fn from_config(config: &WebSocketConfig) -> Self {
        Self::new(
            config.reconnect_base_ms,
            config.reconnect_max_ms,
            config.max_reconnect_attempts,
        )
    }

    /// Delay before the given (zero-based) attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
    }

    /// Delay before the next attempt, or `None` when attempts are used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts > 0 && self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// Back to the base delay after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts made since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_and_caps() {
        let mut backoff = Backoff::new(1000, 30_000, 0);
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay().unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let backoff = Backoff::new(1000, 30_000, 0);
        assert_eq!(backoff.delay_for(200), Duration::from_millis(30_000));
    }

    #[test]
    fn test_attempt_limit() {
        let mut backoff = Backoff::new(10, 100, 2);
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_from_config() {
        let backoff = Backoff::from_config(&WebSocketConfig::default());
        assert_eq!(backoff.delay_for(0), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for(10), Duration::from_millis(30_000));
    }
}

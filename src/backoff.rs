//! Reconnect delay schedule.
//!
//! After the broker has been reached once, every subsequent connection
//! failure waits a doubling delay clamped to `[initial, max]`. The delay
//! resets to the minimum on each successful reconnect. There is no attempt
//! limit: the agent keeps retrying until it is shut down.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            current: initial,
            max,
        }
    }

    /// Returns the delay to wait before the next attempt and advances the
    /// schedule.
    pub fn next_sleep(&mut self) -> Duration {
        let sleep = self.current;
        self.current = (self.current * 2).min(self.max);
        sleep
    }

    /// Call when a connection succeeds so the next failure starts over at
    /// the minimum delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    /// Reconnect policy for the agent: 1 second initial, 30 second cap.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::default();

        assert_eq!(backoff.next_sleep(), Duration::from_secs(1));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(2));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(4));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(8));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(16));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(30));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_reset_returns_to_initial() {
        let mut backoff = Backoff::default();

        backoff.next_sleep();
        backoff.next_sleep();
        backoff.reset();

        assert_eq!(backoff.next_sleep(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_custom_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(4));

        assert_eq!(backoff.next_sleep(), Duration::from_millis(500));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(1));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(2));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(4));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(4));
    }
}

//! Exponential backoff for broker reconnects after boot.
//!
//! ```text
//! delay[n] = min(initial * multiplier^(n-1), max_delay)
//! ```
//!
//! Broker loss after a successful boot is retried indefinitely, so the
//! default policy has no attempt limit. A limit can still be set for tests
//! or for deployments that prefer to give up.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackoffError {
    #[error("Maximum number of attempts exceeded: {0}")]
    MaxAttemptLimitError(u32),
}

/// Reconnect delay controller. Reset on every successful CONNACK.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    attempt: u32,
    /// `None` retries forever.
    max_attempts: Option<u32>,
}

impl Backoff {
    /// Creates a backoff starting at `initial`, growing by `multiplier` and
    /// capped at `max`. A multiplier below 1.0 is treated as 1.0 (fixed delay).
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let max = max.max(initial);
        Self {
            initial_delay: initial,
            current_delay: initial,
            max_delay: max,
            multiplier: multiplier.max(1.0),
            attempt: 0,
            max_attempts: None,
        }
    }

    /// Fixed delay between every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, 1.0)
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    pub fn reset(&mut self) {
        self.current_delay = self.initial_delay;
        self.attempt = 0;
    }

    /// Returns the delay to wait before the next attempt and advances the policy.
    pub fn next_sleep(&mut self) -> Result<Duration, BackoffError> {
        self.attempt = self.attempt.saturating_add(1);
        if let Some(max) = self.max_attempts {
            if self.attempt > max {
                return Err(BackoffError::MaxAttemptLimitError(max));
            }
        }

        let sleep = self.current_delay;

        let next = self.current_delay.as_secs_f64() * self.multiplier;
        self.current_delay = Duration::from_secs_f64(next).min(self.max_delay);

        Ok(sleep)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 1.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_progression_is_capped() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10), 2.0);

        let delays: Vec<_> = (0..6).map(|_| backoff.next_sleep().unwrap()).collect();
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[2], Duration::from_secs(4));
        assert_eq!(delays[3], Duration::from_secs(8));
        assert_eq!(delays[4], Duration::from_secs(10));
        assert_eq!(delays[5], Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_is_unlimited_by_default() {
        let mut backoff = Backoff::default();
        for _ in 0..1_000 {
            assert!(backoff.next_sleep().is_ok());
        }
        assert_eq!(backoff.next_sleep().unwrap(), backoff.max_delay());
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::default();
        backoff.next_sleep().unwrap();
        backoff.next_sleep().unwrap();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_sleep().unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_max_attempts_exceeded() {
        let mut backoff = Backoff::default().with_max_attempts(2);

        assert!(backoff.next_sleep().is_ok());
        assert!(backoff.next_sleep().is_ok());
        match backoff.next_sleep() {
            Err(BackoffError::MaxAttemptLimitError(max)) => assert_eq!(max, 2),
            other => panic!("expected attempt limit error, got {other:?}"),
        }
    }

    #[test]
    fn test_fixed_backoff_never_grows() {
        let mut backoff = Backoff::fixed(Duration::from_secs(2));
        for _ in 0..5 {
            assert_eq!(backoff.next_sleep().unwrap(), Duration::from_secs(2));
        }
    }
}

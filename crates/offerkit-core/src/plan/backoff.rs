//! Backoff policy: decides reconciliation retry delays.

use std::time::Duration;

/// Exponential backoff with a cap.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first attempt.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    /// 8s, 16s, then 30s from there on.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(8),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    pub fn from_millis(base_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        Self {
            base_delay: Duration::from_millis(base_ms),
            multiplier,
            max_delay: Duration::from_millis(max_ms),
        }
    }

    /// Delay before the next attempt, given `attempts` already made
    /// (1-indexed): `base_delay * multiplier^(attempts - 1)`, capped.
    ///
    /// Example with the defaults:
    /// - attempt 1: 8s
    /// - attempt 2: 16s
    /// - attempt 3: 30s (32s capped)
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }
}

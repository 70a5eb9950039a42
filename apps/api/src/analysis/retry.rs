//! Backoff between stage retries.

use std::time::Duration;

/// Exponential backoff: `initial * multiplier^(retry - 1)`, capped at `max_delay`.
/// A multiplier of 1.0 gives a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(4),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given retry (1-indexed). Retry 0 means no wait.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        if !factor.is_finite() {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_capped_at_max_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_retry(4), Duration::from_secs(4));
        assert_eq!(policy.delay_for_retry(30), Duration::from_secs(4));
        assert_eq!(policy.delay_for_retry(u32::MAX), Duration::from_secs(4));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = BackoffPolicy {
            initial_delay: Duration::from_millis(250),
            multiplier: 1.0,
            max_delay: Duration::from_secs(4),
        };
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for_retry(5), Duration::from_millis(250));
    }

    #[test]
    fn test_retry_zero_is_immediate() {
        assert_eq!(BackoffPolicy::default().delay_for_retry(0), Duration::ZERO);
    }
}

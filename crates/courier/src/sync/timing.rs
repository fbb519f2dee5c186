//! Error backoff timing for the session loop
//!
//! Pure functions that can be tested without a running loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential wait between consecutive failed iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBackoff {
    /// Wait after the first consecutive error, in milliseconds
    pub base_ms: u64,
    /// Upper bound on any single wait, in milliseconds
    pub max_ms: u64,
}

impl ErrorBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
        }
    }

    /// Wait before the next poll after `consecutive_errors` failures in a row
    pub fn delay(&self, consecutive_errors: u32) -> Duration {
        backoff_delay(
            consecutive_errors,
            Duration::from_millis(self.base_ms),
            Duration::from_millis(self.max_ms),
        )
    }
}

impl Default for ErrorBackoff {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 30_000,
        }
    }
}

/// Compute `min(base * 2^(n-1), max)`; zero when there were no errors.
///
/// # Arguments
/// * `consecutive_errors` - Failed iterations in a row (0 = last one succeeded)
/// * `base` - Wait after the first error
/// * `max` - Cap on the wait
pub fn backoff_delay(consecutive_errors: u32, base: Duration, max: Duration) -> Duration {
    if consecutive_errors == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32.checked_shl(consecutive_errors - 1).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(2);

    #[test]
    fn test_no_errors_no_wait() {
        assert_eq!(backoff_delay(0, BASE, MAX), Duration::ZERO);
    }

    #[test]
    fn test_doubles_per_error() {
        assert_eq!(backoff_delay(1, BASE, MAX), Duration::from_millis(100));
        assert_eq!(backoff_delay(2, BASE, MAX), Duration::from_millis(200));
        assert_eq!(backoff_delay(3, BASE, MAX), Duration::from_millis(400));
    }

    #[test]
    fn test_capped_at_max() {
        assert_eq!(backoff_delay(6, BASE, MAX), MAX);
        assert_eq!(backoff_delay(40, BASE, MAX), MAX);
        assert_eq!(backoff_delay(u32::MAX, BASE, MAX), MAX);
    }

    #[test]
    fn test_config_round_trip() {
        let backoff = ErrorBackoff::new(Duration::from_millis(250), Duration::from_secs(5));
        assert_eq!(backoff.delay(2), Duration::from_millis(500));
        let parsed: ErrorBackoff = serde_json::from_str(r#"{"base_ms": 250, "max_ms": 5000}"#).unwrap();
        assert_eq!(parsed, backoff);
    }
}

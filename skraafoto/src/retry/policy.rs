//! Retry policy for remote calls.
//!
//! A [`RetryPolicy`] decides how many attempts an operation gets and how long
//! to wait before each retry.
//!
//! # Example
//!
//! ```
//! use skraafoto::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! // Three attempts in total, waiting 1s then 2s between them
//! let policy = RetryPolicy::doubling(3, Duration::from_secs(1));
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_secs(1)));
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(2)));
//! assert_eq!(policy.delay_for_attempt(3), None);
//! ```

use std::time::Duration;

use crate::config::RetrySettings;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How an operation handles transient failures.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    None,

    /// Exponential backoff with configurable parameters.
    ///
    /// The delay is multiplied after each failed attempt, up to a maximum delay.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Maximum delay cap (delay won't exceed this).
        max_delay: Duration,
        /// Multiplier applied to delay after each failure.
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::None
    }
}

impl RetryPolicy {
    /// Creates an uncapped backoff policy that doubles `base_delay` on
    /// every retry.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum number of attempts (including initial)
    /// * `base_delay` - Delay before the first retry
    pub fn doubling(max_attempts: u32, base_delay: Duration) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: base_delay,
            max_delay: Duration::MAX,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Caps every delay at `max_delay`. No effect on [`RetryPolicy::None`].
    pub fn with_max_delay(self, cap: Duration) -> Self {
        match self {
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                multiplier,
                ..
            } => Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay: cap.max(initial_delay),
                multiplier,
            },
            Self::None => Self::None,
        }
    }

    /// Builds the policy from the `[retry]` configuration section.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        let policy = Self::doubling(settings.limit, settings.delay);
        match settings.max_delay {
            Some(cap) => policy.with_max_delay(cap),
            None => policy,
        }
    }

    /// Calculates the delay for a given attempt number.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed (1-based); its delay
    ///   precedes retry number `attempt`
    ///
    /// # Returns
    ///
    /// The delay to wait before the retry, or `None` if no more retries are allowed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt == 0 || attempt >= *max_attempts {
                    return None;
                }
                // initial_delay * multiplier^(attempt-1), capped
                let factor = multiplier.powi((attempt - 1) as i32);
                let secs = (initial_delay.as_secs_f64() * factor).max(0.0);
                let delay = Duration::try_from_secs_f64(secs).unwrap_or(*max_delay);
                Some(delay.min(*max_delay))
            }
        }
    }

    /// Returns the maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::ExponentialBackoff { max_attempts, .. } => (*max_attempts).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_none() {
        let policy = RetryPolicy::None;
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for_attempt(1), None);
    }

    #[test]
    fn test_retry_policy_exponential() {
        let policy = RetryPolicy::ExponentialBackoff {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for_attempt(4), None);
    }

    #[test]
    fn test_retry_policy_exponential_respects_max_delay() {
        let policy = RetryPolicy::ExponentialBackoff {
            max_attempts: 100,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(5), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for_attempt(90), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            limit: 3,
            delay: Duration::from_millis(500),
            max_delay: None,
        };
        let policy = RetryPolicy::from_settings(&settings);

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for_attempt(3), None);
    }

    #[test]
    fn test_doubling_is_uncapped() {
        let policy = RetryPolicy::doubling(8, Duration::from_secs(1));
        for k in 1..8 {
            assert_eq!(
                policy.delay_for_attempt(k),
                Some(Duration::from_secs(1 << (k - 1))),
                "retry {}",
                k
            );
        }
        assert_eq!(policy.delay_for_attempt(7), Some(Duration::from_secs(64)));
    }

    #[test]
    fn test_from_settings_applies_configured_cap() {
        let settings = RetrySettings {
            limit: 8,
            delay: Duration::from_secs(1),
            max_delay: Some(Duration::from_secs(10)),
        };
        let policy = RetryPolicy::from_settings(&settings);

        assert_eq!(policy.delay_for_attempt(4), Some(Duration::from_secs(8)));
        assert_eq!(policy.delay_for_attempt(5), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for_attempt(7), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_huge_attempt_count_saturates_instead_of_panicking() {
        let policy = RetryPolicy::doubling(u32::MAX, Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(5000), Some(Duration::MAX));
    }

    #[test]
    fn test_single_attempt_budget_never_retries() {
        let policy = RetryPolicy::doubling(1, Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), None);
    }
}

//! Bounded retries with exponential backoff.
//!
//! [`with_retry`] drives an async operation under a [`RetryPolicy`]. It stops
//! on success, on the first non-retryable error, when the attempt budget is
//! spent, or when the cancellation token fires. Every error seen along the
//! way is handed back so callers can report status codes and messages.

mod policy;

pub use policy::{RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER};

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classification of an error for retry purposes.
pub trait Retryable {
    /// Whether another attempt may succeed.
    fn is_retryable(&self) -> bool;

    /// HTTP status code behind this error, if any.
    fn http_status(&self) -> Option<u16> {
        None
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt in the budget failed with a retryable error.
    Exhausted { attempts: u32, errors: Vec<E> },
    /// An attempt failed with an error that retrying cannot fix.
    Fatal { attempts: u32, errors: Vec<E> },
    /// The cancellation token fired before an attempt succeeded.
    Cancelled { errors: Vec<E> },
}

impl<E> RetryError<E> {
    /// All errors observed, oldest first.
    pub fn errors(&self) -> &[E] {
        match self {
            Self::Exhausted { errors, .. }
            | Self::Fatal { errors, .. }
            | Self::Cancelled { errors } => errors,
        }
    }

    /// The error of the final attempt.
    pub fn last_error(&self) -> Option<&E> {
        self.errors().last()
    }

    /// Attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Fatal { attempts, .. } => *attempts,
            Self::Cancelled { errors } => errors.len() as u32,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl<E: Retryable> RetryError<E> {
    /// HTTP status codes seen across all attempts, oldest first.
    pub fn status_codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.errors().iter().filter_map(Retryable::http_status)
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, errors } => {
                write!(f, "gave up after {} attempt(s)", attempts)?;
                if let Some(last) = errors.last() {
                    write!(f, ": {}", last)?;
                }
                Ok(())
            }
            Self::Fatal { errors, .. } => match errors.last() {
                Some(last) => write!(f, "{}", last),
                None => f.write_str("failed"),
            },
            Self::Cancelled { .. } => f.write_str("cancelled"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Runs `op` until it succeeds or the policy gives up.
///
/// `op` receives the 1-based attempt number. The token is checked before each
/// attempt and raced against both the attempt and the backoff sleep.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let mut errors = Vec::new();
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { errors });
        }
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { errors }),
            result = op(attempt) => result,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            debug!(operation, attempt, error = %error, "Non-retryable failure");
            errors.push(error);
            return Err(RetryError::Fatal {
                attempts: attempt,
                errors,
            });
        }

        match policy.delay_for_attempt(attempt) {
            Some(delay) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                errors.push(error);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled { errors }),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                warn!(operation, attempts = attempt, error = %error, "Retry budget exhausted");
                errors.push(error);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    errors,
                });
            }
        }
    }
}

//! Bounded retry with a fixed delay between attempts.
//!
//! Every external call in the pipeline (endpoint discovery, collection and
//! item extraction, file transfer) runs inside its own [`RetryPolicy`]. The
//! policy is deliberately flat: a constant delay, no backoff multiplier and
//! no jitter, and the error surfaced after exhaustion is the one from the
//! final attempt.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vidgrab_core::retry::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(5));
//!
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Default maximum attempts per operation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts (5 seconds).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on a later attempt. Consumes one attempt from the budget.
    Transient,

    /// Will not succeed regardless of retries. Ends the loop immediately.
    Permanent,
}

/// Errors that can be classified for retry decisions.
///
/// The default classification is [`FailureType::Transient`], so every
/// failure consumes one attempt unless the error type says otherwise.
pub trait Retryable {
    /// Returns how the retry loop should treat this error.
    fn failure_type(&self) -> FailureType {
        FailureType::Transient
    }
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Attempt budget and fixed inter-attempt delay for one call site.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `delay`: 5 seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Constant pause between attempts.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with an explicit budget and delay.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Creates a policy with a custom budget, using the default delay.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_RETRY_DELAY)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }

    /// Runs `attempt_fn` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-indexed attempt number. Each failure is
    /// logged with its attempt counter; only the final error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt when every attempt failed, or
    /// the first [`FailureType::Permanent`] error encountered.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                "starting attempt"
            );

            let error = match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.should_retry(error.failure_type(), attempt) {
                RetryDecision::Retry { delay, .. } => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        %reason,
                        error = %error,
                        "giving up"
                    );
                    return Err(error);
                }
            }
        }
    }
}

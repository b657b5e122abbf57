//! Bounded retry with failure classification and an optional backoff.

use crate::scraper::error::FetchError;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Delay before the next attempt after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

/// Default classifier: every fetch failure, malformed URLs included, is retried up to the cap.
pub fn retry_all(_: &FetchError) -> bool {
    true
}

/// Result of running an operation under a [RetryPolicy].
#[derive(Debug)]
pub enum RetryResult<T> {
    Done(T),
    /// Every attempt failed with a retryable error; `last` is the final one.
    Exhausted { attempts: u32, last: FetchError },
    /// Classifier rejected the error; no further attempts were made.
    Terminal { attempt: u32, error: FetchError },
}

/// Attempt cap, retryable-vs-terminal classifier, and backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    classifier: fn(&FetchError) -> bool,
    backoff: Backoff,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            classifier: retry_all,
            backoff: Backoff::None,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` (at least 1), the default classifier and no backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Replace the retryable-vs-terminal classifier. Return true to retry.
    pub fn with_classifier(mut self, classifier: fn(&FetchError) -> bool) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn is_retryable(&self, error: &FetchError) -> bool {
        (self.classifier)(error)
    }

    /// Run `op` until it succeeds, fails terminally, or the attempt cap is reached.
    /// `on_failure` sees every failed attempt (1-based number and error), terminal or not.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, FetchError>,
        mut on_failure: impl FnMut(u32, &FetchError),
    ) -> RetryResult<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match op(attempt) {
                Ok(value) => return RetryResult::Done(value),
                Err(e) => e,
            };
            on_failure(attempt, &error);
            if !self.is_retryable(&error) {
                return RetryResult::Terminal {
                    attempt,
                    error,
                };
            }
            if attempt >= self.max_attempts {
                return RetryResult::Exhausted {
                    attempts: attempt,
                    last: error,
                };
            }
            let delay = self.backoff.delay(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }
}

//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failed attempt is retryable (transient transport errors)
//! - Execute retries with linear backoff
//! - Stop retrying once the client has gone away
//!
//! # Design Decisions
//! - Upstream responses are never retried, whatever their status
//! - At most `max_retries` retries after the first attempt
//! - The abort check happens before and after the backoff sleep so no
//!   upstream call is issued for a client that disconnected

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Errors that may be worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Shared flag raised when the downstream client disconnects.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// A guard that raises the signal when dropped.
    ///
    /// Held by the request handler: if hyper drops the handler future
    /// because the client went away, the guard fires.
    pub fn guard(&self) -> AbortOnDrop {
        AbortOnDrop {
            signal: self.clone(),
            armed: true,
        }
    }
}

/// RAII guard returned by [`AbortSignal::guard`].
#[derive(Debug)]
pub struct AbortOnDrop {
    signal: AbortSignal,
    armed: bool,
}

impl AbortOnDrop {
    /// The request completed normally; dropping no longer aborts.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.signal.abort();
        }
    }
}

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Whether attempt `attempt` (1-based) that failed with `err` gets another try.
    pub fn should_retry<E: Retryable>(&self, attempt: u32, err: &E) -> bool {
        attempt <= self.max_retries && err.is_retryable()
    }

    /// Run `attempt` until it succeeds, fails permanently, runs out of
    /// retries, or the client aborts. The closure receives the 1-based
    /// attempt number.
    pub async fn run<T, E, F, Fut>(&self, abort: &AbortSignal, mut attempt: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut number = 1;
        loop {
            let err = match attempt(number).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.should_retry(number, &err) {
                return Err(err);
            }
            if abort.is_aborted() {
                tracing::debug!(attempt = number, "Client disconnected, skipping retry");
                return Err(err);
            }

            let delay = calculate_backoff(number, self.base_delay_ms);
            tracing::info!(attempt = number, delay_ms = delay.as_millis() as u64, "Retrying after transient failure");
            tokio::time::sleep(delay).await;

            if abort.is_aborted() {
                tracing::debug!(attempt = number, "Client disconnected during backoff, skipping retry");
                return Err(err);
            }
            number += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Transient,
        Permanent,
    }

    impl Retryable for FakeError {
        fn is_retryable(&self) -> bool {
            matches!(self, FakeError::Transient)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
        })
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(&AbortSignal::new(), |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(FakeError::Transient)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(&AbortSignal::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Transient) }
            })
            .await;
        assert_eq!(result, Err(FakeError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(&AbortSignal::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Permanent) }
            })
            .await;
        assert_eq!(result, Err(FakeError::Permanent));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aborted_client_stops_retries() {
        let abort = AbortSignal::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(&abort, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                abort.abort();
                async { Err(FakeError::Transient) }
            })
            .await;
        assert_eq!(result, Err(FakeError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_fires_unless_disarmed() {
        let signal = AbortSignal::new();
        drop(signal.guard());
        assert!(signal.is_aborted());

        let signal = AbortSignal::new();
        signal.guard().disarm();
        assert!(!signal.is_aborted());
    }

    #[test]
    fn attempt_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.should_retry(1, &FakeError::Transient));
        assert!(policy.should_retry(2, &FakeError::Transient));
        assert!(!policy.should_retry(3, &FakeError::Transient));
        assert!(!policy.should_retry(1, &FakeError::Permanent));
    }
}

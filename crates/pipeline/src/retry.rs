//! Bounded re-attempts around a chunk submission.
//!
//! Unlike a reconnect loop there is no backoff growth: every re-attempt
//! waits the policy's fixed delay and resubmits the same chunk unchanged.

use std::future::Future;

use registrar_core::retry::RetryPolicy;

use crate::error::StoreError;

/// The last failure once a submission has run out of attempts.
#[derive(Debug, Clone)]
pub struct RetryExhausted {
    /// Attempts made, including the first.
    pub attempts: u32,
    pub last_error: StoreError,
}

/// Run `attempt` until it succeeds, fails terminally, or the policy's
/// attempt budget is spent.
///
/// `attempt` receives the 1-based attempt number. `on_retry` is called
/// with the failed attempt number and its error just before the delay
/// that precedes the next attempt.
pub async fn submit_with_retry<T, F, Fut, R>(
    policy: &RetryPolicy,
    mut attempt: F,
    mut on_retry: R,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
    R: FnMut(u32, &StoreError),
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match attempt(attempts).await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(attempts, "Chunk submission succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if policy.should_retry(attempts, e.is_transient()) => {
                tracing::warn!(
                    attempt = attempts,
                    max_attempts = policy.max_attempts(),
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Chunk submission failed, retrying",
                );
                on_retry(attempts, &e);
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                tracing::warn!(
                    attempts,
                    transient = e.is_transient(),
                    error = %e,
                    "Chunk submission gave up",
                );
                return Err(RetryExhausted {
                    attempts,
                    last_error: e,
                });
            }
        }
    }
}

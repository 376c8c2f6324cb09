//! Bounded retry policy for chunk submission.
//!
//! `max_retries` counts re-attempts after the first failure, so a policy
//! with `max_retries = 3` makes at most four attempts. Each re-attempt
//! waits a fixed delay; only transient failures are retried.

use std::time::Duration;

use crate::options::ImportOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_options(options: &ImportOptions) -> Self {
        Self {
            enabled: options.auto_retry,
            max_retries: options.max_retries,
            delay: Duration::from_millis(options.retry_delay_ms),
        }
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Upper bound on attempts for a single chunk, including the first.
    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// Whether another attempt should follow `attempts_made` failed ones.
    pub fn should_retry(&self, attempts_made: u32, transient: bool) -> bool {
        transient && attempts_made < self.max_attempts()
    }
}

/// What the controller does once a chunk has exhausted its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedAction {
    /// Fail the whole job.
    AbortJob,
    /// Mark the chunk's rows failed and continue with the next chunk.
    SkipChunk,
}

impl ExhaustedAction {
    pub fn from_options(options: &ImportOptions) -> Self {
        if options.continue_on_chunk_failure {
            Self::SkipChunk
        } else {
            Self::AbortJob
        }
    }
}

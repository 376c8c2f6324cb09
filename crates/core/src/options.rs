//! Caller-supplied import options, defaults and range checks.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::threshold_validation::validate_int_range;

// ---------------------------------------------------------------------------
// Defaults and limits
// ---------------------------------------------------------------------------

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const MIN_CHUNK_SIZE: usize = 10;
pub const MAX_CHUNK_SIZE: usize = 1000;

pub const DEFAULT_DELAY_BETWEEN_CHUNKS_MS: u64 = 1000;
pub const MAX_DELAY_BETWEEN_CHUNKS_MS: u64 = 10_000;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const MIN_MAX_RETRIES: u32 = 1;
pub const MAX_MAX_RETRIES: u32 = 10;

pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Record field that receives [`ImportOptions::default_status`].
pub const STATUS_FIELD: &str = "status";

// ---------------------------------------------------------------------------
// ImportOptions
// ---------------------------------------------------------------------------

/// Options recognised by the import engine. Immutable for the duration of
/// a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Rows per chunk (10–1000).
    pub chunk_size: usize,
    /// Pause between successful chunks in milliseconds (0–10000).
    pub delay_between_chunks_ms: u64,
    /// Re-attempt failed chunks.
    pub auto_retry: bool,
    /// Re-attempts after the first failure (1–10).
    pub max_retries: u32,
    /// Fixed wait between attempts in milliseconds (0–60000).
    pub retry_delay_ms: u64,
    /// Exclude rows whose key already exists in the store.
    pub skip_duplicates: bool,
    /// Logical field compared against the store when skipping duplicates.
    pub key_field: Option<String>,
    /// Value written to the `status` field of each new record.
    pub default_status: Option<String>,
    /// Validate rows only; never touch the store.
    pub validate_only: bool,
    /// Count rows with validation errors as failed instead of submitting them.
    pub skip_invalid_rows: bool,
    /// Mark an exhausted chunk's rows failed and move on instead of
    /// failing the whole job.
    pub continue_on_chunk_failure: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            delay_between_chunks_ms: DEFAULT_DELAY_BETWEEN_CHUNKS_MS,
            auto_retry: true,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            skip_duplicates: false,
            key_field: None,
            default_status: None,
            validate_only: false,
            skip_invalid_rows: false,
            continue_on_chunk_failure: false,
        }
    }
}

impl ImportOptions {
    /// Check every numeric option against its accepted range and the
    /// duplicate-skipping prerequisites.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_int_range(
            self.chunk_size as u64,
            MIN_CHUNK_SIZE as u64,
            MAX_CHUNK_SIZE as u64,
            "chunk_size",
        )?;
        validate_int_range(
            self.delay_between_chunks_ms,
            0,
            MAX_DELAY_BETWEEN_CHUNKS_MS,
            "delay_between_chunks_ms",
        )?;
        validate_int_range(
            self.max_retries as u64,
            MIN_MAX_RETRIES as u64,
            MAX_MAX_RETRIES as u64,
            "max_retries",
        )?;
        validate_int_range(self.retry_delay_ms, 0, MAX_RETRY_DELAY_MS, "retry_delay_ms")?;

        if self.skip_duplicates
            && self
                .key_field
                .as_deref()
                .map_or(true, |f| f.trim().is_empty())
        {
            return Err(CoreError::Validation(
                "key_field is required when skip_duplicates is enabled".into(),
            ));
        }
        Ok(())
    }

    /// The key field to deduplicate on, if duplicate skipping is active.
    pub fn duplicate_key(&self) -> Option<&str> {
        if self.skip_duplicates && !self.validate_only {
            self.key_field.as_deref()
        } else {
            None
        }
    }
}

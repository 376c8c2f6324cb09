//! Error types for the import engine and its collaborators.

use std::path::PathBuf;

use registrar_core::types::JobId;

/// Failure of a whole store operation (not a per-row rejection).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused service; worth retrying.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not finish in time; worth retrying.
    #[error("Store operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The store rejected the whole request; retrying will not help.
    #[error("Store rejected request: {0}")]
    Rejected(String),

    #[error("Store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether a retry of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

/// Failure decoding the uploaded dataset.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed dataset: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    #[error("Dataset contains no rows")]
    Empty,
}

/// Errors returned by the job registry's public operations.
///
/// Failures inside a running job never surface here; they are recorded on
/// the job and delivered in its `ImportResult`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Import job {0} not found")]
    JobNotFound(JobId),

    #[error("Destination '{target}' already has an active import job {job_id}")]
    TargetBusy { target: String, job_id: JobId },

    #[error("Result of import job {0} has already been taken")]
    AlreadyAwaited(JobId),

    #[error("Import task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::Unavailable("503".into()).is_transient());
        assert!(StoreError::Timeout { elapsed_ms: 3000 }.is_transient());
        assert!(!StoreError::Rejected("schema".into()).is_transient());
        assert!(!StoreError::Internal("bug".into()).is_transient());
    }

    #[test]
    fn display_timeout() {
        let err = StoreError::Timeout { elapsed_ms: 3000 };
        assert_eq!(err.to_string(), "Store operation timed out after 3000ms");
    }

    #[test]
    fn display_empty_source() {
        assert_eq!(SourceError::Empty.to_string(), "Dataset contains no rows");
    }

    #[test]
    fn display_target_busy() {
        let job_id = registrar_core::types::new_job_id();
        let err = PipelineError::TargetBusy {
            target: "attendees".into(),
            job_id,
        };
        assert!(err.to_string().starts_with("Destination 'attendees'"));
    }
}

//! Import job lifecycle.
//!
//! ```text
//! idle -> preparing -> processing <-> paused -> completed | failed | cancelled
//! ```
//!
//! `preparing` may also go straight to `failed` (bad dataset, bad options)
//! or `cancelled`.

use serde::{Deserialize, Serialize};

pub const IMPORT_STATUS_IDLE: &str = "idle";
pub const IMPORT_STATUS_PREPARING: &str = "preparing";
pub const IMPORT_STATUS_PROCESSING: &str = "processing";
pub const IMPORT_STATUS_PAUSED: &str = "paused";
pub const IMPORT_STATUS_COMPLETED: &str = "completed";
pub const IMPORT_STATUS_FAILED: &str = "failed";
pub const IMPORT_STATUS_CANCELLED: &str = "cancelled";

/// Runtime state of an import job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet started.
    #[default]
    Idle,
    /// Decoding the dataset and computing chunk counts.
    Preparing,
    /// Iterating chunks.
    Processing,
    /// Waiting for a resume or cancel signal at a chunk boundary.
    Paused,
    /// All chunks handled without a fatal failure.
    Completed,
    /// Preparation failed or a chunk failure aborted the job.
    Failed,
    /// Stopped by a cancel signal.
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => IMPORT_STATUS_IDLE,
            Self::Preparing => IMPORT_STATUS_PREPARING,
            Self::Processing => IMPORT_STATUS_PROCESSING,
            Self::Paused => IMPORT_STATUS_PAUSED,
            Self::Completed => IMPORT_STATUS_COMPLETED,
            Self::Failed => IMPORT_STATUS_FAILED,
            Self::Cancelled => IMPORT_STATUS_CANCELLED,
        }
    }

    /// Whether the job has reached an end state and will not change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Preparing, Processing)
                | (Preparing, Failed)
                | (Preparing, Cancelled)
                | (Processing, Paused)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
                | (Paused, Processing)
                | (Paused, Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

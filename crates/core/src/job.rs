//! Import job state and terminal result.
//!
//! [`BatchJob`] is owned by one controller and mutated only through the
//! methods here, which keep the counters consistent:
//!
//! - `processed_records == successful_records + failed_records`
//! - `processed_records + skipped_records <= total_records`
//! - `total_chunks == ceil(total_records / chunk_size)`

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dataset::total_chunks;
use crate::estimation::ProgressEstimate;
use crate::import_status::JobStatus;
use crate::types::{JobId, Timestamp};
use crate::validation::ImportError;

/// Accounting for one chunk once it has finished (or been given up on).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub successful: usize,
    pub failed: usize,
    /// Rows excluded as duplicates; neither success nor failure.
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

impl ChunkOutcome {
    pub fn rows(&self) -> usize {
        self.successful + self.failed + self.skipped
    }
}

/// Live state of one import run, published as a read-only snapshot after
/// every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    pub status: JobStatus,
    pub total_records: usize,
    pub processed_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
    pub skipped_records: usize,
    pub current_chunk_index: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub start_time: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub errors: Vec<ImportError>,
    /// Records per second.
    pub throughput: f64,
    pub eta_seconds: Option<u64>,
}

impl BatchJob {
    pub fn new(id: JobId, chunk_size: usize) -> Self {
        Self {
            id,
            status: JobStatus::Idle,
            total_records: 0,
            processed_records: 0,
            successful_records: 0,
            failed_records: 0,
            skipped_records: 0,
            current_chunk_index: 0,
            total_chunks: 0,
            chunk_size,
            start_time: None,
            finished_at: None,
            errors: Vec::new(),
            throughput: 0.0,
            eta_seconds: None,
        }
    }

    /// Move to `next` if the lifecycle allows it. Returns whether the
    /// status changed.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        if next == JobStatus::Preparing {
            self.start_time = Some(Utc::now());
        }
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
            if next == JobStatus::Completed {
                self.eta_seconds = None;
            }
        }
        self.status = next;
        true
    }

    /// Fix the record and chunk totals once the dataset is decoded.
    pub fn set_totals(&mut self, total_records: usize) {
        self.total_records = total_records;
        self.total_chunks = total_chunks(total_records, self.chunk_size);
    }

    /// Fold a finished chunk into the counters.
    ///
    /// Counts are clamped so the job never reports more handled rows than
    /// it has.
    pub fn apply(&mut self, outcome: ChunkOutcome) {
        let mut room = self.remaining_records();
        let successful = outcome.successful.min(room);
        room -= successful;
        let failed = outcome.failed.min(room);
        room -= failed;
        let skipped = outcome.skipped.min(room);

        self.successful_records += successful;
        self.failed_records += failed;
        self.skipped_records += skipped;
        self.processed_records = self.successful_records + self.failed_records;
        self.errors.extend(outcome.errors);
    }

    pub fn push_error(&mut self, error: ImportError) {
        self.errors.push(error);
    }

    pub fn set_estimate(&mut self, estimate: ProgressEstimate) {
        self.throughput = estimate.throughput;
        self.eta_seconds = estimate.eta_seconds;
    }

    /// Rows that have reached a final disposition, skips included.
    pub fn handled_records(&self) -> usize {
        self.processed_records + self.skipped_records
    }

    pub fn remaining_records(&self) -> usize {
        self.total_records.saturating_sub(self.handled_records())
    }

    /// Build the terminal summary from the current state.
    pub fn to_result(&self) -> ImportResult {
        ImportResult {
            job_id: self.id,
            status: self.status,
            success: self.status == JobStatus::Completed,
            total_records: self.total_records,
            successful_imports: self.successful_records,
            failed_imports: self.failed_records,
            skipped_duplicates: self.skipped_records,
            errors: self.errors.clone(),
            started_at: self.start_time,
            finished_at: self.finished_at,
        }
    }
}

/// Final, immutable summary of a completed, failed, or cancelled job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub success: bool,
    pub total_records: usize,
    pub successful_imports: usize,
    pub failed_imports: usize,
    pub skipped_duplicates: usize,
    pub errors: Vec<ImportError>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl ImportResult {
    /// Rows neither imported nor failed: duplicates and rows never reached.
    pub fn unaccounted(&self) -> usize {
        self.total_records
            .saturating_sub(self.successful_imports + self.failed_imports)
    }
}

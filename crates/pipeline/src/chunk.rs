//! Execution of one chunk: map, validate, deduplicate, submit.
//!
//! The executor never fails: every path ends in a [`ChunkOutcome`] whose
//! counts cover each row of the chunk exactly once. Whether an exhausted
//! chunk aborts the job is the controller's decision.

use std::collections::HashSet;
use std::sync::Arc;

use registrar_core::duplicate_detection::DuplicatePartition;
use registrar_core::job::ChunkOutcome;
use registrar_core::options::ImportOptions;
use registrar_core::retry::RetryPolicy;
use registrar_core::types::RowMap;
use registrar_core::validation::{map_row, CompiledRules, FieldMapping, ImportError, RowRecord};

use crate::dedupe::DuplicateResolver;
use crate::error::StoreError;
use crate::retry::submit_with_retry;
use crate::store::{InsertOutcome, Store};

/// Prefix of the error message recorded for each row the store declines.
pub const STORE_REJECTED_PREFIX: &str = "Store rejected row:";

/// How a chunk ended.
#[derive(Debug)]
pub enum ChunkExecution {
    /// The store accepted the submission (or nothing needed submitting).
    Completed(ChunkOutcome),
    /// Every attempt failed; the submitted rows are counted as failed.
    Exhausted {
        outcome: ChunkOutcome,
        attempts: u32,
        error: StoreError,
    },
}

impl ChunkExecution {
    pub fn outcome(&self) -> &ChunkOutcome {
        match self {
            Self::Completed(outcome) | Self::Exhausted { outcome, .. } => outcome,
        }
    }

    pub fn into_outcome(self) -> ChunkOutcome {
        match self {
            Self::Completed(outcome) | Self::Exhausted { outcome, .. } => outcome,
        }
    }
}

/// Result of one successful submission attempt.
struct Submission {
    submitted: usize,
    skipped: usize,
    insert: InsertOutcome,
}

/// Per-job chunk executor. Built once the job's preparation succeeds.
pub struct ChunkExecutor {
    store: Arc<dyn Store>,
    mapping: FieldMapping,
    rules: CompiledRules,
    resolver: Option<DuplicateResolver>,
    policy: RetryPolicy,
    default_status: Option<String>,
    validate_only: bool,
    skip_invalid_rows: bool,
}

impl ChunkExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        mapping: FieldMapping,
        rules: CompiledRules,
        options: &ImportOptions,
    ) -> Self {
        Self {
            store,
            mapping,
            rules,
            resolver: options.duplicate_key().map(DuplicateResolver::new),
            policy: RetryPolicy::from_options(options),
            default_status: options.default_status.clone(),
            validate_only: options.validate_only,
            skip_invalid_rows: options.skip_invalid_rows,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run chunk `chunk_index`, whose first row sits at dataset index
    /// `first_row`.
    ///
    /// `on_retry` is called before each re-attempt with the failed attempt
    /// number and its error.
    pub async fn execute<R>(
        &self,
        chunk_index: usize,
        first_row: usize,
        rows: &[RowMap],
        on_retry: R,
    ) -> ChunkExecution
    where
        R: FnMut(u32, &StoreError),
    {
        let mut outcome = ChunkOutcome::default();
        let records: Vec<RowRecord> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                map_row(
                    &self.mapping,
                    first_row + i + 1,
                    row,
                    self.default_status.as_deref(),
                )
            })
            .collect();

        let mut invalid: HashSet<usize> = HashSet::new();
        for record in &records {
            let errors = self.rules.evaluate(record);
            if !errors.is_empty() {
                invalid.insert(record.row_number);
                outcome.errors.extend(errors);
            }
        }

        if self.validate_only {
            outcome.failed = invalid.len();
            outcome.successful = records.len() - invalid.len();
            tracing::debug!(
                chunk_index,
                valid = outcome.successful,
                invalid = outcome.failed,
                "Validated chunk",
            );
            return ChunkExecution::Completed(outcome);
        }

        let to_submit: Vec<RowRecord> = if self.skip_invalid_rows {
            outcome.failed += invalid.len();
            records
                .into_iter()
                .filter(|r| !invalid.contains(&r.row_number))
                .collect()
        } else {
            records
        };

        if to_submit.is_empty() {
            return ChunkExecution::Completed(outcome);
        }

        let this = self;
        let batch = to_submit.as_slice();
        let result =
            submit_with_retry(&self.policy, move |_| this.submit(batch), on_retry).await;

        match result {
            Ok(submission) => {
                self.account(&mut outcome, submission, chunk_index);
                ChunkExecution::Completed(outcome)
            }
            Err(exhausted) => {
                outcome.failed += to_submit.len();
                outcome.errors.push(ImportError::general(format!(
                    "Chunk {} failed after {} attempt(s): {}",
                    chunk_index + 1,
                    exhausted.attempts,
                    exhausted.last_error,
                )));
                ChunkExecution::Exhausted {
                    outcome,
                    attempts: exhausted.attempts,
                    error: exhausted.last_error,
                }
            }
        }
    }

    /// One attempt: duplicate lookup, then a single multi-row insert.
    async fn submit(&self, records: &[RowRecord]) -> Result<Submission, StoreError> {
        let partition = match &self.resolver {
            Some(resolver) => resolver.resolve(self.store.as_ref(), records.to_vec()).await?,
            None => DuplicatePartition {
                unique: records.to_vec(),
                duplicates: Vec::new(),
            },
        };

        let insert = if partition.unique.is_empty() {
            InsertOutcome::default()
        } else {
            self.store.insert_many(&partition.unique).await?
        };

        Ok(Submission {
            submitted: partition.unique.len(),
            skipped: partition.duplicates.len(),
            insert,
        })
    }

    fn account(&self, outcome: &mut ChunkOutcome, submission: Submission, chunk_index: usize) {
        let Submission {
            submitted,
            skipped,
            insert,
        } = submission;

        let rejected = insert.rejected.len().min(submitted);
        let inserted = insert.inserted.min(submitted - rejected);
        let unconfirmed = submitted - rejected - inserted;

        outcome.skipped += skipped;
        outcome.successful += inserted;
        outcome.failed += rejected + unconfirmed;
        outcome.errors.extend(insert.rejected.into_iter().map(|r| {
            ImportError::row(r.row_number, format!("{STORE_REJECTED_PREFIX} {}", r.message))
        }));

        if unconfirmed > 0 {
            tracing::warn!(
                chunk_index,
                submitted,
                inserted,
                rejected,
                "Store did not confirm every submitted row",
            );
            outcome.errors.push(ImportError::general(format!(
                "Store confirmed {} of {submitted} rows in chunk {}",
                inserted + rejected,
                chunk_index + 1,
            )));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The destination store collaborator.

use std::collections::HashSet;

use async_trait::async_trait;
use registrar_core::validation::RowRecord;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A row the store declined while accepting the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row_number: usize,
    pub message: String,
}

/// Result of a multi-row insert that did not fail as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub rejected: Vec<RejectedRow>,
}

/// Remote store that import chunks are written to.
///
/// Implementations own transport and schema concerns; the engine only
/// needs a multi-row insert and an existence check on one field.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert `records` as a single operation.
    ///
    /// `Err` means the whole operation failed and nothing should be
    /// considered written. Per-row refusals go in
    /// [`InsertOutcome::rejected`].
    async fn insert_many(&self, records: &[RowRecord]) -> Result<InsertOutcome, StoreError>;

    /// Return the subset of `values` that already exist for `key_field`.
    ///
    /// `values` are trimmed but keep their original case. Implementations
    /// may compare exactly or case-insensitively; the returned values are
    /// normalised by the caller either way.
    async fn find_existing(
        &self,
        key_field: &str,
        values: &[String],
    ) -> Result<HashSet<String>, StoreError>;
}

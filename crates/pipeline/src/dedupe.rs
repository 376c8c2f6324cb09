//! Store-backed duplicate suppression for one chunk.

use std::collections::HashSet;

use registrar_core::duplicate_detection::{
    distinct_keys, normalize_key, partition_duplicates, DuplicatePartition,
};
use registrar_core::validation::RowRecord;

use crate::error::StoreError;
use crate::store::Store;

/// Looks up a chunk's keys in the store and splits off the duplicates.
#[derive(Debug, Clone)]
pub struct DuplicateResolver {
    key_field: String,
}

impl DuplicateResolver {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
        }
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Partition `records` into rows to submit and rows to skip.
    ///
    /// The store is only queried when the chunk has at least one key.
    pub async fn resolve(
        &self,
        store: &dyn Store,
        records: Vec<RowRecord>,
    ) -> Result<DuplicatePartition, StoreError> {
        let keys = distinct_keys(&records, &self.key_field);
        let existing: HashSet<String> = if keys.is_empty() {
            HashSet::new()
        } else {
            store
                .find_existing(&self.key_field, &keys)
                .await?
                .iter()
                .map(|v| normalize_key(v))
                .collect()
        };

        let partition = partition_duplicates(records, &self.key_field, &existing);
        if !partition.duplicates.is_empty() {
            tracing::debug!(
                key_field = %self.key_field,
                duplicates = partition.duplicates.len(),
                unique = partition.unique.len(),
                "Skipping duplicate rows",
            );
        }
        Ok(partition)
    }
}

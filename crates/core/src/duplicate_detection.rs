//! Duplicate-key detection for import chunks.
//!
//! The store lookup itself lives in the pipeline crate; this module holds
//! the key normalisation and partitioning rules so they stay pure and
//! testable.

use std::collections::HashSet;

use crate::validation::RowRecord;

/// Normalise a key value for comparison: trimmed and ASCII-lowercased.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Distinct, non-empty key values present in `records`, trimmed but with
/// their original case, in first-seen order.
///
/// Every spelling is kept so a store that compares exactly can still find
/// each one; callers normalise what the store returns.
pub fn distinct_keys(records: &[RowRecord], key_field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.get(key_field))
        .map(|v| v.trim())
        .filter(|k| !k.is_empty() && seen.insert(*k))
        .map(str::to_string)
        .collect()
}

/// Rows split into those to submit and those skipped as duplicates.
#[derive(Debug, Default)]
pub struct DuplicatePartition {
    pub unique: Vec<RowRecord>,
    pub duplicates: Vec<RowRecord>,
}

/// Split `records` by whether their key already exists.
///
/// `existing` must hold normalised keys. A key repeated within `records`
/// is kept on its first occurrence and skipped afterwards. Rows without a
/// key value are always kept.
pub fn partition_duplicates(
    records: Vec<RowRecord>,
    key_field: &str,
    existing: &HashSet<String>,
) -> DuplicatePartition {
    let mut seen: HashSet<String> = HashSet::new();
    let mut partition = DuplicatePartition::default();

    for record in records {
        let key = record.get(key_field).map(normalize_key);
        let is_duplicate = match key {
            Some(k) if !k.is_empty() => existing.contains(&k) || !seen.insert(k),
            _ => false,
        };
        if is_duplicate {
            partition.duplicates.push(record);
        } else {
            partition.unique.push(record);
        }
    }

    partition
}

//! In-memory [`Store`] used by the worker binary and the test-suite.
//!
//! Besides holding records it can simulate the failure modes the engine
//! has to cope with: scripted whole-operation failures, per-row
//! uniqueness rejections, and slow inserts.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use registrar_core::duplicate_detection::normalize_key;
use registrar_core::validation::RowRecord;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{InsertOutcome, RejectedRow, Store};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<BTreeMap<String, String>>>,
    /// Errors returned by upcoming `insert_many` calls, one per call.
    scripted_failures: Mutex<VecDeque<StoreError>>,
    /// Row numbers submitted by every `insert_many` call, failed ones too.
    insert_log: Mutex<Vec<Vec<usize>>>,
    unique_field: Option<String>,
    insert_latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject rows whose `field` value is already stored.
    pub fn with_unique_field(mut self, field: impl Into<String>) -> Self {
        self.unique_field = Some(field.into());
        self
    }

    /// Sleep this long inside every `insert_many` call.
    pub fn with_insert_latency(mut self, latency: Duration) -> Self {
        self.insert_latency = Some(latency);
        self
    }

    /// Seed the store with existing records.
    pub async fn seed<I>(&self, records: I)
    where
        I: IntoIterator<Item = BTreeMap<String, String>>,
    {
        self.records.lock().await.extend(records);
    }

    /// Make the next `count` insert calls fail with `error`.
    pub async fn fail_next_inserts(&self, count: usize, error: StoreError) {
        let mut failures = self.scripted_failures.lock().await;
        failures.extend(std::iter::repeat(error).take(count));
    }

    pub async fn records(&self) -> Vec<BTreeMap<String, String>> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Row numbers of every submitted batch, in call order.
    pub async fn insert_log(&self) -> Vec<Vec<usize>> {
        self.insert_log.lock().await.clone()
    }

    pub async fn insert_calls(&self) -> usize {
        self.insert_log.lock().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_many(&self, records: &[RowRecord]) -> Result<InsertOutcome, StoreError> {
        self.insert_log
            .lock()
            .await
            .push(records.iter().map(|r| r.row_number).collect());

        if let Some(latency) = self.insert_latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.scripted_failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut stored = self.records.lock().await;
        let mut taken: HashSet<String> = match &self.unique_field {
            Some(field) => stored
                .iter()
                .filter_map(|r| r.get(field))
                .map(|v| normalize_key(v))
                .collect(),
            None => HashSet::new(),
        };

        let mut outcome = InsertOutcome::default();
        for record in records {
            if let Some(field) = &self.unique_field {
                if let Some(value) = record.get(field) {
                    if !taken.insert(normalize_key(value)) {
                        outcome.rejected.push(RejectedRow {
                            row_number: record.row_number,
                            message: format!("duplicate value for {field}"),
                        });
                        continue;
                    }
                }
            }
            stored.push(record.values.clone());
            outcome.inserted += 1;
        }

        Ok(outcome)
    }

    async fn find_existing(
        &self,
        key_field: &str,
        values: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let stored = self.records.lock().await;
        let present: HashSet<String> = stored
            .iter()
            .filter_map(|r| r.get(key_field))
            .map(|v| normalize_key(v))
            .collect();

        Ok(values
            .iter()
            .filter(|v| present.contains(&normalize_key(v)))
            .cloned()
            .collect())
    }
}

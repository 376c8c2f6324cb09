#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use registrar_core::dataset::Dataset;
use registrar_core::options::ImportOptions;
use registrar_core::types::RowMap;
use registrar_core::validation::{FieldMapping, ValidationRule, ValidationRules};
use registrar_events::{EventBus, EventKind, ImportEvent};
use registrar_pipeline::{ImportRequest, StaticSource};
use tokio::sync::broadcast;

pub const HEADERS: [&str; 3] = ["Full Name", "E-mail", "Company"];

/// `n` attendee rows with unique e-mail addresses.
pub fn attendees(n: usize) -> Dataset {
    let rows = (0..n).map(|i| attendee(i, &format!("attendee{i}@example.com"))).collect();
    Dataset::new(HEADERS.iter().map(|h| h.to_string()).collect(), rows)
}

pub fn attendee(i: usize, email: &str) -> RowMap {
    RowMap::from([
        ("Full Name".to_string(), format!("Attendee {i}")),
        ("E-mail".to_string(), email.to_string()),
        ("Company".to_string(), "Acme".to_string()),
    ])
}

pub fn mapping() -> FieldMapping {
    FieldMapping::new()
        .with("name", "Full Name")
        .with("email", "E-mail")
        .with("company", "Company")
}

pub fn rules() -> ValidationRules {
    let mut rules = ValidationRules::new();
    rules.insert("name".into(), ValidationRule::required());
    rules.insert("email".into(), ValidationRule::required());
    rules
}

/// Options with no pacing or retry delays.
pub fn fast_options() -> ImportOptions {
    ImportOptions {
        delay_between_chunks_ms: 0,
        retry_delay_ms: 0,
        ..Default::default()
    }
}

pub fn request(dataset: Dataset, options: ImportOptions) -> ImportRequest {
    ImportRequest {
        source: Box::new(StaticSource::new(dataset)),
        mapping: mapping(),
        rules: rules(),
        options,
    }
}

pub fn bus() -> Arc<EventBus> {
    Arc::new(EventBus::default())
}

/// Every event already queued on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<ImportEvent>) -> Vec<ImportEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// `(chunk_index, rows)` of each `ChunkStarted` event, in order.
pub fn chunk_starts(events: &[ImportEvent]) -> Vec<(usize, usize)> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::ChunkStarted { chunk_index, rows } => Some((chunk_index, rows)),
            _ => None,
        })
        .collect()
}

/// `processed_records` of each progress snapshot, in order.
pub fn processed_series(events: &[ImportEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Progress { snapshot } => Some(snapshot.processed_records),
            _ => None,
        })
        .collect()
}

pub fn stored_emails(records: &[BTreeMap<String, String>]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get("email").cloned())
        .collect()
}

//! End-to-end tests for the batch controller lifecycle.
//!
//! Each test drives a real job task against the in-memory store and
//! observes it through the event bus, the snapshot channel and the
//! store's call log.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use registrar_core::dataset::Dataset;
use registrar_core::import_status::JobStatus;
use registrar_core::options::ImportOptions;
use registrar_core::types::new_job_id;
use registrar_events::EventKind;
use registrar_pipeline::{
    BatchController, ImportRequest, JsonFileSource, MemoryStore, StoreError,
};

use common::*;

// ---------------------------------------------------------------------------
// Test: 250 rows in chunks of 100
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chunks_are_visited_in_order_and_all_rows_imported() {
    let store = Arc::new(MemoryStore::new());
    let bus = bus();
    let mut rx = bus.subscribe();
    let options = ImportOptions {
        chunk_size: 100,
        ..fast_options()
    };

    let handle = BatchController::start(
        new_job_id(),
        store.clone(),
        bus,
        request(attendees(250), options),
    );
    let result = handle.wait().await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.total_records, 250);
    assert_eq!(result.successful_imports, 250);
    assert_eq!(result.failed_imports, 0);
    assert!(result.errors.is_empty());

    let events = drain(&mut rx);
    assert_eq!(chunk_starts(&events), vec![(0, 100), (1, 100), (2, 50)]);
    assert_matches!(events.last().map(|e| &e.kind), Some(EventKind::Finished { .. }));

    let log = store.insert_log().await;
    let sizes: Vec<usize> = log.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(log[0][0], 1);
    assert_eq!(log[2][49], 250);
    assert_eq!(store.len().await, 250);
}

// ---------------------------------------------------------------------------
// Test: a missing required field yields one error with the 1-based row
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_required_field_reports_row_number() {
    let mut dataset = attendees(30);
    dataset.rows[16].insert("Full Name".to_string(), "   ".to_string());

    let handle = BatchController::start(
        new_job_id(),
        Arc::new(MemoryStore::new()),
        bus(),
        request(dataset, ImportOptions {
            chunk_size: 10,
            ..fast_options()
        }),
    );
    let result = handle.wait().await.unwrap();

    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.row, 17);
    assert_eq!(error.field.as_deref(), Some("name"));
    assert_eq!(error.message, "name is required");
    // The row is still forwarded to the store.
    assert_eq!(result.successful_imports, 30);
}

// ---------------------------------------------------------------------------
// Test: two transient failures then success
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chunk_succeeds_on_third_attempt_and_job_continues() {
    let store = Arc::new(MemoryStore::new());
    store
        .fail_next_inserts(2, StoreError::Unavailable("503 Service Unavailable".into()))
        .await;
    let bus = bus();
    let mut rx = bus.subscribe();

    let handle = BatchController::start(
        new_job_id(),
        store.clone(),
        bus,
        request(attendees(30), ImportOptions {
            chunk_size: 10,
            max_retries: 3,
            ..fast_options()
        }),
    );
    let result = handle.wait().await.unwrap();

    assert!(result.success);
    assert_eq!(result.successful_imports, 30);
    assert_eq!(result.failed_imports, 0);
    assert_eq!(store.insert_calls().await, 5);

    let retries: Vec<(usize, u32, u32)> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::ChunkRetry {
                chunk_index,
                attempt,
                max_attempts,
                ..
            } => Some((chunk_index, attempt, max_attempts)),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![(0, 2, 4), (0, 3, 4)]);
}

// ---------------------------------------------------------------------------
// Test: pause freezes progress and starts no chunk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_freezes_progress_until_resume() {
    let store = Arc::new(MemoryStore::new());
    let bus = bus();
    let mut rx = bus.subscribe();

    let handle = BatchController::start(
        new_job_id(),
        store.clone(),
        bus,
        request(attendees(30), ImportOptions {
            chunk_size: 10,
            delay_between_chunks_ms: 200,
            ..fast_options()
        }),
    );
    let controls = handle.controls().clone();
    let mut snapshots = controls.subscribe();

    snapshots
        .wait_for(|job| job.processed_records >= 10)
        .await
        .unwrap();
    controls.pause();
    snapshots
        .wait_for(|job| job.status == JobStatus::Paused)
        .await
        .unwrap();

    let frozen = controls.snapshot().processed_records;
    let calls = store.insert_calls().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(controls.snapshot().processed_records, frozen);
    assert_eq!(controls.status(), JobStatus::Paused);
    assert_eq!(store.insert_calls().await, calls);

    controls.resume();
    let result = handle.wait().await.unwrap();
    assert!(result.success);
    assert_eq!(result.successful_imports, 30);

    // No chunk started between the Paused and Resumed events.
    let names: Vec<&str> = drain(&mut rx)
        .iter()
        .map(|e| e.kind.name())
        .filter(|n| *n != "import.progress")
        .collect();
    let paused = names.iter().position(|n| *n == "import.paused").unwrap();
    assert_eq!(names[paused + 1], "import.resumed");
}

// ---------------------------------------------------------------------------
// Test: cancel lets the in-flight chunk finish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_completes_in_flight_chunk_then_stops() {
    let store = Arc::new(MemoryStore::new().with_insert_latency(Duration::from_millis(50)));

    let handle = BatchController::start(
        new_job_id(),
        store.clone(),
        bus(),
        request(attendees(50), ImportOptions {
            chunk_size: 10,
            ..fast_options()
        }),
    );
    let controls = handle.controls().clone();
    let mut snapshots = controls.subscribe();

    snapshots
        .wait_for(|job| job.current_chunk_index == 1)
        .await
        .unwrap();
    let processed_at_cancel = controls.snapshot().processed_records;
    controls.cancel();

    let result = handle.wait().await.unwrap();
    assert_eq!(result.status, JobStatus::Cancelled);
    assert!(!result.success);
    assert_eq!(processed_at_cancel, 10);
    assert_eq!(result.successful_imports, 20);
    assert_eq!(store.insert_calls().await, 2);
    assert!(result.finished_at.is_some());
}

#[tokio::test]
async fn cancel_while_paused_ends_job() {
    let handle = BatchController::start(
        new_job_id(),
        Arc::new(MemoryStore::new()),
        bus(),
        request(attendees(30), ImportOptions {
            chunk_size: 10,
            ..fast_options()
        }),
    );
    let controls = handle.controls().clone();
    controls.pause();
    controls
        .subscribe()
        .wait_for(|job| job.status == JobStatus::Paused)
        .await
        .unwrap();

    controls.cancel();
    let result = handle.wait().await.unwrap();
    assert_eq!(result.status, JobStatus::Cancelled);
    assert_eq!(result.successful_imports, 0);
}

// ---------------------------------------------------------------------------
// Test: processed count is monotonic and bounded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn processed_records_never_decrease() {
    let store = Arc::new(MemoryStore::new());
    store
        .fail_next_inserts(1, StoreError::Rejected("payload too large".into()))
        .await;
    let bus = bus();
    let mut rx = bus.subscribe();

    let handle = BatchController::start(
        new_job_id(),
        store,
        bus,
        request(attendees(95), ImportOptions {
            chunk_size: 10,
            continue_on_chunk_failure: true,
            ..fast_options()
        }),
    );
    let result = handle.wait().await.unwrap();

    let series = processed_series(&drain(&mut rx));
    assert!(!series.is_empty());
    assert!(series.windows(2).all(|w| w[0] <= w[1]));
    assert!(series.iter().all(|p| *p <= 95));
    assert_eq!(*series.last().unwrap(), 95);
    assert_eq!(result.failed_imports, 10);
    assert_eq!(result.successful_imports, 85);
}

// ---------------------------------------------------------------------------
// Test: preparation failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_dataset_fails_with_single_general_error() {
    let dataset = Dataset::new(HEADERS.iter().map(|h| h.to_string()).collect(), Vec::new());
    let store = Arc::new(MemoryStore::new());

    let handle = BatchController::start(
        new_job_id(),
        store.clone(),
        bus(),
        request(dataset, fast_options()),
    );
    let controls = handle.controls().clone();
    let result = handle.wait().await.unwrap();

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_general());
    assert_eq!(result.errors[0].message, "Dataset contains no rows");
    assert_eq!(controls.snapshot().total_chunks, 0);
    assert_eq!(store.insert_calls().await, 0);
}

#[tokio::test]
async fn unknown_mapped_column_fails_preparation() {
    let mut request = request(attendees(5), fast_options());
    request.mapping = mapping().with("phone", "Mobile");

    let result = BatchController::start(
        new_job_id(),
        Arc::new(MemoryStore::new()),
        bus(),
        request,
    )
    .wait()
    .await
    .unwrap();

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("Mobile"));
}

#[tokio::test]
async fn unreadable_file_fails_preparation() {
    let request = ImportRequest {
        source: Box::new(JsonFileSource::new("/nonexistent/attendees.json")),
        mapping: mapping(),
        rules: rules(),
        options: fast_options(),
    };

    let result = BatchController::start(
        new_job_id(),
        Arc::new(MemoryStore::new()),
        bus(),
        request,
    )
    .wait()
    .await
    .unwrap();

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result.errors[0].message.contains("/nonexistent/attendees.json"));
}

// ---------------------------------------------------------------------------
// Test: validate-only mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validate_only_makes_no_store_calls_and_skips_delay() {
    let mut dataset = attendees(25);
    dataset.rows[3].insert("E-mail".to_string(), String::new());
    let store = Arc::new(MemoryStore::new());

    let handle = BatchController::start(
        new_job_id(),
        store.clone(),
        bus(),
        request(dataset, ImportOptions {
            chunk_size: 10,
            delay_between_chunks_ms: 1000,
            validate_only: true,
            ..Default::default()
        }),
    );
    let result = tokio::time::timeout(Duration::from_millis(900), handle.wait())
        .await
        .expect("validate-only run should not wait between chunks")
        .unwrap();

    assert!(result.success);
    assert_eq!(result.successful_imports, 24);
    assert_eq!(result.failed_imports, 1);
    assert_eq!(result.errors[0].row, 4);
    assert_eq!(store.insert_calls().await, 0);
    assert!(store.is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: JSON file source end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn imports_from_json_file_with_default_status() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "headers": ["Full Name", "E-mail", "Company"],
            "rows": [
                {{"Full Name": "Ann", "E-mail": "ann@example.com", "Company": "Acme"}},
                {{"Full Name": "Bob", "E-mail": "bob@example.com", "Company": null}}
            ]
        }}"#
    )
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    let request = ImportRequest {
        source: Box::new(JsonFileSource::new(file.path())),
        mapping: mapping(),
        rules: rules(),
        options: ImportOptions {
            default_status: Some("registered".into()),
            ..fast_options()
        },
    };

    let result = BatchController::start(new_job_id(), store.clone(), bus(), request)
        .wait()
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.successful_imports, 2);
    let records = store.records().await;
    assert_eq!(stored_emails(&records), vec!["ann@example.com", "bob@example.com"]);
    assert!(records.iter().all(|r| r.get("status").map(String::as_str) == Some("registered")));
    assert!(!records[1].contains_key("company"));
}

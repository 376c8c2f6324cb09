//! Runs one import job described by a [`WorkerConfig`].
//!
//! The worker wires the pipeline together: it loads the mapping and rule
//! files, starts the job through a [`JobRegistry`] against an in-memory
//! store, logs bus events as they arrive, and cancels the job cleanly on
//! Ctrl-C.

pub mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use registrar_core::job::ImportResult;
use registrar_core::validation::{FieldMapping, ValidationRules};
use registrar_events::{EventBus, EventKind, ImportEvent};
use registrar_pipeline::{ImportRequest, JobRegistry, JsonFileSource, MemoryStore};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

pub use config::{LogFormat, WorkerConfig};

/// Run the configured import to a terminal state and return its result.
pub async fn run(config: WorkerConfig) -> anyhow::Result<ImportResult> {
    let mapping: FieldMapping = load_json(&config.mapping_path)
        .await
        .context("Failed to load field mapping")?;
    let rules: ValidationRules = match &config.rules_path {
        Some(path) => load_json(path)
            .await
            .context("Failed to load validation rules")?,
        None => ValidationRules::new(),
    };

    let bus = Arc::new(EventBus::default());
    let registry = JobRegistry::new(Arc::clone(&bus));
    let logger = tokio::spawn(log_events(bus.subscribe()));

    let request = ImportRequest {
        source: Box::new(JsonFileSource::new(&config.dataset_path)),
        mapping,
        rules,
        options: config.options,
    };

    tracing::info!(
        dataset = %config.dataset_path.display(),
        destination = %config.target,
        "Starting import",
    );
    let controls = registry
        .start(config.target.as_str(), Arc::new(MemoryStore::new()), request)
        .await?;
    let job_id = controls.id();

    let wait = registry.wait(job_id);
    tokio::pin!(wait);
    let result = tokio::select! {
        result = &mut wait => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(job_id = %job_id, "Interrupt received, cancelling import");
            controls.cancel();
            wait.as_mut().await?
        }
    };

    // The logger exits on the job's Finished event.
    let _ = logger.await;
    Ok(result)
}

async fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Log bus events until a job finishes or the bus closes.
async fn log_events(mut rx: broadcast::Receiver<ImportEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        let job_id = event.job_id;
        match event.kind {
            EventKind::Progress { snapshot } => tracing::debug!(
                job_id = %job_id,
                status = %snapshot.status,
                processed = snapshot.processed_records,
                total = snapshot.total_records,
                throughput = snapshot.throughput,
                eta_seconds = ?snapshot.eta_seconds,
                "Progress",
            ),
            EventKind::ChunkStarted { chunk_index, rows } => {
                tracing::info!(job_id = %job_id, chunk = chunk_index + 1, rows, "Chunk started")
            }
            EventKind::ChunkRetry {
                chunk_index,
                attempt,
                max_attempts,
                error,
            } => tracing::warn!(
                job_id = %job_id,
                chunk = chunk_index + 1,
                attempt,
                max_attempts,
                error = %error,
                "Retrying chunk",
            ),
            EventKind::Paused => tracing::info!(job_id = %job_id, "Paused"),
            EventKind::Resumed => tracing::info!(job_id = %job_id, "Resumed"),
            EventKind::Finished { result } => {
                tracing::info!(
                    job_id = %job_id,
                    status = %result.status,
                    successful = result.successful_imports,
                    failed = result.failed_imports,
                    skipped = result.skipped_duplicates,
                    errors = result.errors.len(),
                    "Import finished",
                );
                return;
            }
        }
    }
}

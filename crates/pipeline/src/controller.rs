//! Batch controller: the per-job state machine.
//!
//! [`BatchController::start`] spawns one Tokio task that owns the job's
//! [`BatchJob`] for its whole life. The task prepares the dataset, then
//! walks the chunks strictly in order. Callers steer it through
//! [`JobControls`], which delivers [`ControlSignal`]s over a channel; the
//! task looks at them only at chunk boundaries and during the pause
//! between chunks, so a chunk that has started always runs to the end.
//!
//! After every state change the task sends the snapshot to a `watch`
//! channel (latest value, for pollers) and publishes an
//! [`ImportEvent`] on the shared [`EventBus`] (full history, for
//! subscribers).

use std::sync::Arc;
use std::time::{Duration, Instant};

use registrar_core::dataset::{chunk_range, Dataset};
use registrar_core::estimation::ProgressEstimator;
use registrar_core::import_status::JobStatus;
use registrar_core::job::{BatchJob, ImportResult};
use registrar_core::options::ImportOptions;
use registrar_core::retry::ExhaustedAction;
use registrar_core::types::JobId;
use registrar_core::validation::{CompiledRules, FieldMapping, ImportError, ValidationRules};
use registrar_events::{EventBus, EventKind, ImportEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::chunk::{ChunkExecution, ChunkExecutor};
use crate::error::{PipelineError, SourceError};
use crate::source::RowSource;
use crate::store::Store;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Everything needed to run one import.
pub struct ImportRequest {
    pub source: Box<dyn RowSource>,
    pub mapping: FieldMapping,
    pub rules: ValidationRules,
    pub options: ImportOptions,
}

/// Control messages accepted by a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Pause,
    Resume,
    Cancel,
}

/// Cloneable remote control for one job.
///
/// All operations are non-blocking and idempotent. Signals sent after the
/// job has finished are dropped.
#[derive(Debug, Clone)]
pub struct JobControls {
    id: JobId,
    signals: mpsc::UnboundedSender<ControlSignal>,
    snapshots: watch::Receiver<BatchJob>,
}

impl JobControls {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn pause(&self) {
        self.send(ControlSignal::Pause);
    }

    pub fn resume(&self) {
        self.send(ControlSignal::Resume);
    }

    pub fn cancel(&self) {
        self.send(ControlSignal::Cancel);
    }

    /// The most recent snapshot of the job.
    pub fn snapshot(&self) -> BatchJob {
        self.snapshots.borrow().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.snapshots.borrow().status
    }

    /// A receiver that observes every subsequent snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<BatchJob> {
        self.snapshots.clone()
    }

    fn send(&self, signal: ControlSignal) {
        if self.signals.send(signal).is_err() {
            tracing::debug!(
                job_id = %self.id,
                ?signal,
                "Import job has finished; control signal dropped",
            );
        }
    }
}

/// Controls plus the task that yields the job's [`ImportResult`].
#[derive(Debug)]
pub struct ImportHandle {
    controls: JobControls,
    task: JoinHandle<ImportResult>,
}

impl ImportHandle {
    pub fn id(&self) -> JobId {
        self.controls.id
    }

    pub fn controls(&self) -> &JobControls {
        &self.controls
    }

    /// Wait for the job to reach a terminal state.
    pub async fn wait(self) -> Result<ImportResult, PipelineError> {
        self.task
            .await
            .map_err(|e| PipelineError::TaskFailed(e.to_string()))
    }

    pub fn into_parts(self) -> (JobControls, JoinHandle<ImportResult>) {
        (self.controls, self.task)
    }
}

/// Entry point for running a single import job.
pub struct BatchController;

impl BatchController {
    /// Spawn the job task and return its handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        id: JobId,
        store: Arc<dyn Store>,
        bus: Arc<EventBus>,
        request: ImportRequest,
    ) -> ImportHandle {
        let job = BatchJob::new(id, request.options.chunk_size);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(job.clone());

        let run = JobRun {
            job,
            signals: signal_rx,
            snapshots: snapshot_tx,
            bus,
            pause_requested: false,
        };
        let task = tokio::spawn(run.run(store, request));

        ImportHandle {
            controls: JobControls {
                id,
                signals: signal_tx,
                snapshots: snapshot_rx,
            },
            task,
        }
    }
}

// ---------------------------------------------------------------------------
// Job task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancel,
}

struct Prepared {
    dataset: Dataset,
    executor: ChunkExecutor,
}

struct JobRun {
    job: BatchJob,
    signals: mpsc::UnboundedReceiver<ControlSignal>,
    snapshots: watch::Sender<BatchJob>,
    bus: Arc<EventBus>,
    /// A pause seen during the inter-chunk delay, applied at the boundary.
    pause_requested: bool,
}

impl JobRun {
    async fn run(mut self, store: Arc<dyn Store>, request: ImportRequest) -> ImportResult {
        let id = self.job.id;
        let options = request.options.clone();

        self.transition(JobStatus::Preparing);
        tracing::info!(job_id = %id, chunk_size = options.chunk_size, "Preparing import");

        let Prepared { dataset, executor } = match prepare(store, request).await {
            Ok(prepared) => prepared,
            Err(message) => {
                tracing::error!(job_id = %id, error = %message, "Import preparation failed");
                self.job.push_error(ImportError::general(message));
                self.transition(JobStatus::Failed);
                return self.finish();
            }
        };

        self.job.set_totals(dataset.len());
        self.transition(JobStatus::Processing);
        tracing::info!(
            job_id = %id,
            total_records = self.job.total_records,
            total_chunks = self.job.total_chunks,
            validate_only = options.validate_only,
            "Import started",
        );

        let total = self.job.total_records;
        let total_chunks = self.job.total_chunks;
        let exhausted_action = ExhaustedAction::from_options(&options);
        let max_attempts = executor.policy().max_attempts();
        let delay = Duration::from_millis(options.delay_between_chunks_ms);
        let mut estimator = ProgressEstimator::new();

        for index in 0..total_chunks {
            if self.checkpoint().await == Flow::Cancel {
                return self.cancelled();
            }

            let range = chunk_range(index, self.job.chunk_size, total);
            self.job.current_chunk_index = index;
            self.job
                .set_estimate(estimator.tick(Instant::now(), self.job.handled_records(), total));
            self.publish();
            self.bus.publish(ImportEvent::new(
                id,
                EventKind::ChunkStarted {
                    chunk_index: index,
                    rows: range.len(),
                },
            ));
            tracing::debug!(job_id = %id, chunk_index = index, rows = range.len(), "Chunk started");

            let bus = Arc::clone(&self.bus);
            let execution = executor
                .execute(index, range.start, &dataset.rows[range.clone()], |attempt, e| {
                    bus.publish(ImportEvent::new(
                        id,
                        EventKind::ChunkRetry {
                            chunk_index: index,
                            attempt: attempt + 1,
                            max_attempts,
                            error: e.to_string(),
                        },
                    ));
                })
                .await;

            match execution {
                ChunkExecution::Completed(outcome) => {
                    tracing::info!(
                        job_id = %id,
                        chunk_index = index,
                        successful = outcome.successful,
                        failed = outcome.failed,
                        skipped = outcome.skipped,
                        "Chunk finished",
                    );
                    self.job.apply(outcome);
                    self.publish();
                }
                ChunkExecution::Exhausted {
                    outcome,
                    attempts,
                    error,
                } => {
                    self.job.apply(outcome);
                    match exhausted_action {
                        ExhaustedAction::AbortJob => {
                            tracing::error!(
                                job_id = %id,
                                chunk_index = index,
                                attempts,
                                error = %error,
                                "Chunk failed, aborting import",
                            );
                            self.transition(JobStatus::Failed);
                            return self.finish();
                        }
                        ExhaustedAction::SkipChunk => {
                            tracing::warn!(
                                job_id = %id,
                                chunk_index = index,
                                attempts,
                                error = %error,
                                "Chunk failed, continuing with next chunk",
                            );
                            self.publish();
                        }
                    }
                }
            }

            let is_last = index + 1 == total_chunks;
            if !is_last
                && !options.validate_only
                && !delay.is_zero()
                && self.pace(delay).await == Flow::Cancel
            {
                return self.cancelled();
            }
        }

        self.transition(JobStatus::Completed);
        tracing::info!(
            job_id = %id,
            successful = self.job.successful_records,
            failed = self.job.failed_records,
            skipped = self.job.skipped_records,
            "Import completed",
        );
        self.finish()
    }

    /// Apply pending control signals at a chunk boundary.
    ///
    /// Cancel wins over pause. While paused the task blocks on the
    /// channel; if every sender is gone the job is cancelled.
    async fn checkpoint(&mut self) -> Flow {
        loop {
            match self.signals.try_recv() {
                Ok(ControlSignal::Cancel) => return Flow::Cancel,
                Ok(ControlSignal::Pause) => self.pause_requested = true,
                Ok(ControlSignal::Resume) => self.pause_requested = false,
                Err(_) => break,
            }
        }

        if !self.pause_requested {
            return Flow::Continue;
        }
        self.pause_requested = false;

        self.transition(JobStatus::Paused);
        self.bus
            .publish(ImportEvent::new(self.job.id, EventKind::Paused));
        tracing::info!(
            job_id = %self.job.id,
            processed = self.job.processed_records,
            "Import paused",
        );

        loop {
            match self.signals.recv().await {
                Some(ControlSignal::Resume) => break,
                Some(ControlSignal::Pause) => {}
                Some(ControlSignal::Cancel) | None => return Flow::Cancel,
            }
        }

        self.transition(JobStatus::Processing);
        self.bus
            .publish(ImportEvent::new(self.job.id, EventKind::Resumed));
        tracing::info!(job_id = %self.job.id, "Import resumed");
        Flow::Continue
    }

    /// Wait out the delay between chunks.
    ///
    /// A cancel ends the wait at once. A pause also ends it and takes
    /// effect at the following boundary.
    async fn pace(&mut self, delay: Duration) -> Flow {
        let deadline = tokio::time::Instant::now() + delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return Flow::Continue,
                signal = self.signals.recv() => match signal {
                    Some(ControlSignal::Cancel) => return Flow::Cancel,
                    Some(ControlSignal::Pause) => {
                        self.pause_requested = true;
                        return Flow::Continue;
                    }
                    Some(ControlSignal::Resume) => self.pause_requested = false,
                    None => {
                        tokio::time::sleep_until(deadline).await;
                        return Flow::Continue;
                    }
                },
            }
        }
    }

    fn transition(&mut self, next: JobStatus) {
        let from = self.job.status;
        if self.job.transition(next) {
            self.publish();
        } else {
            tracing::warn!(job_id = %self.job.id, %from, to = %next, "Ignored illegal status transition");
        }
    }

    fn cancelled(mut self) -> ImportResult {
        self.transition(JobStatus::Cancelled);
        tracing::info!(
            job_id = %self.job.id,
            processed = self.job.processed_records,
            total = self.job.total_records,
            "Import cancelled",
        );
        self.finish()
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.job.clone());
        self.bus.publish(ImportEvent::progress(&self.job));
    }

    fn finish(self) -> ImportResult {
        let result = self.job.to_result();
        self.bus.publish(ImportEvent::finished(&result));
        result
    }
}

/// Decode the dataset and check the request against it.
///
/// Errors are returned as the message recorded on the job.
async fn prepare(store: Arc<dyn Store>, request: ImportRequest) -> Result<Prepared, String> {
    let ImportRequest {
        source,
        mapping,
        rules,
        options,
    } = request;

    options.validate().map_err(|e| e.to_string())?;

    let dataset = source.decode().await.map_err(|e| e.to_string())?;
    if dataset.is_empty() {
        return Err(SourceError::Empty.to_string());
    }

    mapping
        .check_against(&dataset.headers)
        .map_err(|e| e.to_string())?;

    if let Some(key) = options.duplicate_key() {
        if !mapping.contains_field(key) {
            return Err(format!("key_field '{key}' is not mapped to a source column"));
        }
    }

    let rules = CompiledRules::compile(&rules, &mapping).map_err(|e| e.to_string())?;
    let executor = ChunkExecutor::new(store, mapping, rules, &options);

    Ok(Prepared { dataset, executor })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

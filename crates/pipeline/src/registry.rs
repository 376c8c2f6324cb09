//! Registry of import jobs.
//!
//! [`JobRegistry`] hands out job ids, keeps each job's controls and task
//! handle, and routes control calls by id. It allows at most one active
//! (non-terminal) job per destination, so two imports never write to the
//! same target concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use registrar_core::job::{BatchJob, ImportResult};
use registrar_core::types::{new_job_id, JobId};
use registrar_events::bus::ImportEvent;
use registrar_events::EventBus;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::controller::{BatchController, ImportRequest, JobControls};
use crate::error::PipelineError;
use crate::store::Store;

/// How long [`JobRegistry::shutdown`] waits for each job to stop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Internal bookkeeping for a single job.
struct RegisteredJob {
    target: String,
    controls: JobControls,
    /// Taken by the first [`JobRegistry::wait`] call.
    task: Option<JoinHandle<ImportResult>>,
}

impl RegisteredJob {
    fn is_active(&self) -> bool {
        !self.controls.status().is_terminal()
    }
}

/// Starts, tracks and controls import jobs.
///
/// Created once and shared via `Arc`.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, RegisteredJob>>,
    bus: Arc<EventBus>,
}

impl JobRegistry {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Subscribe to events from every job started by this registry.
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.bus.subscribe()
    }

    /// Start a job writing to `target`.
    ///
    /// Fails with [`PipelineError::TargetBusy`] if another job for the
    /// same target has not reached a terminal state.
    pub async fn start(
        &self,
        target: impl Into<String>,
        store: Arc<dyn Store>,
        request: ImportRequest,
    ) -> Result<JobControls, PipelineError> {
        let target = target.into();
        let mut jobs = self.jobs.write().await;

        if let Some((job_id, _)) = jobs
            .iter()
            .find(|(_, job)| job.target == target && job.is_active())
        {
            tracing::warn!(destination = %target, job_id = %job_id, "Refusing concurrent import");
            return Err(PipelineError::TargetBusy {
                target,
                job_id: *job_id,
            });
        }

        let id = new_job_id();
        let handle = BatchController::start(id, store, Arc::clone(&self.bus), request);
        let (controls, task) = handle.into_parts();

        tracing::info!(job_id = %id, destination = %target, "Import job registered");
        jobs.insert(
            id,
            RegisteredJob {
                target,
                controls: controls.clone(),
                task: Some(task),
            },
        );

        Ok(controls)
    }

    pub async fn pause(&self, id: JobId) -> Result<(), PipelineError> {
        self.controls(id).await?.pause();
        Ok(())
    }

    pub async fn resume(&self, id: JobId) -> Result<(), PipelineError> {
        self.controls(id).await?.resume();
        Ok(())
    }

    pub async fn cancel(&self, id: JobId) -> Result<(), PipelineError> {
        self.controls(id).await?.cancel();
        Ok(())
    }

    /// Latest snapshot of a job.
    pub async fn snapshot(&self, id: JobId) -> Result<BatchJob, PipelineError> {
        Ok(self.controls(id).await?.snapshot())
    }

    /// Wait for a job's terminal result. Only the first call gets it.
    pub async fn wait(&self, id: JobId) -> Result<ImportResult, PipelineError> {
        let task = {
            let mut jobs = self.jobs.write().await;
            let job = jobs.get_mut(&id).ok_or(PipelineError::JobNotFound(id))?;
            job.task.take().ok_or(PipelineError::AlreadyAwaited(id))?
        };

        task.await
            .map_err(|e| PipelineError::TaskFailed(e.to_string()))
    }

    /// Ids of jobs that have not reached a terminal state.
    pub async fn active_jobs(&self) -> Vec<JobId> {
        self.jobs
            .read()
            .await
            .iter()
            .filter(|(_, job)| job.is_active())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Forget finished jobs whose result has already been collected by
    /// [`wait`](Self::wait). Returns how many were removed.
    pub async fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.is_active() || job.task.is_some());
        before - jobs.len()
    }

    /// Cancel every job, then wait up to 5 seconds per task for it to
    /// stop.
    ///
    /// The registry is emptied up front, so other calls are not blocked
    /// while tasks wind down.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down import registry");

        let jobs: Vec<(JobId, RegisteredJob)> = self.jobs.write().await.drain().collect();
        for (_, job) in &jobs {
            job.controls.cancel();
        }

        for (id, job) in jobs {
            if let Some(task) = job.task {
                tracing::info!(job_id = %id, "Stopping import job");
                if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                    tracing::warn!(job_id = %id, "Import job did not stop in time");
                }
            }
        }

        tracing::info!("Import registry shut down complete");
    }

    async fn controls(&self, id: JobId) -> Result<JobControls, PipelineError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .map(|job| job.controls.clone())
            .ok_or(PipelineError::JobNotFound(id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every running job publishes its lifecycle here; the registry shares one
//! `Arc<EventBus>` across jobs so a single subscriber can follow them all.

use chrono::Utc;
use registrar_core::job::{BatchJob, ImportResult};
use registrar_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// ImportEvent
// ---------------------------------------------------------------------------

/// Something that happened to one import job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEvent {
    pub job_id: JobId,
    pub kind: EventKind,
    /// Publish time.
    pub timestamp: Timestamp,
}

/// Event payloads, tagged by `type` when serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Full snapshot after a state mutation.
    Progress { snapshot: Box<BatchJob> },
    /// A chunk is about to be executed.
    ChunkStarted { chunk_index: usize, rows: usize },
    /// A chunk attempt failed and will be re-attempted.
    ChunkRetry {
        chunk_index: usize,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    Paused,
    Resumed,
    /// The job reached a terminal state.
    Finished { result: Box<ImportResult> },
}

impl EventKind {
    /// Short dot-separated name, e.g. `"import.chunk_retry"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "import.progress",
            Self::ChunkStarted { .. } => "import.chunk_started",
            Self::ChunkRetry { .. } => "import.chunk_retry",
            Self::Paused => "import.paused",
            Self::Resumed => "import.resumed",
            Self::Finished { .. } => "import.finished",
        }
    }
}

impl ImportEvent {
    pub fn new(job_id: JobId, kind: EventKind) -> Self {
        Self {
            job_id,
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn progress(snapshot: &BatchJob) -> Self {
        Self::new(
            snapshot.id,
            EventKind::Progress {
                snapshot: Box::new(snapshot.clone()),
            },
        )
    }

    pub fn finished(result: &ImportResult) -> Self {
        Self::new(
            result.job_id,
            EventKind::Finished {
                result: Box::new(result.clone()),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Events buffered per subscriber before the slowest one starts lagging.
pub const EVENT_BUFFER: usize = 1024;

/// Fan-out of [`ImportEvent`]s to every observer of every job.
///
/// ```rust
/// use registrar_core::types::new_job_id;
/// use registrar_events::bus::{EventBus, EventKind, ImportEvent};
///
/// let bus = EventBus::default();
/// let _rx = bus.subscribe();
///
/// let delivered = bus.publish(ImportEvent::new(new_job_id(), EventKind::Paused));
/// assert_eq!(delivered, 1);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ImportEvent>,
}

impl EventBus {
    /// A bus holding up to `buffer` undelivered events per subscriber.
    ///
    /// Subscribers that fall further behind receive `RecvError::Lagged` and
    /// miss the oldest events; the latest snapshot is always available from
    /// the job's own watch channel.
    pub fn with_buffer(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    /// Deliver `event` and return how many subscribers it reached.
    pub fn publish(&self, event: ImportEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive every event published from now on, for all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_buffer(EVENT_BUFFER)
    }
}

//! Chunked batch-import engine.
//!
//! Drives a decoded dataset through validation, duplicate suppression and
//! paced, retried chunk submission into a [`Store`](store::Store):
//!
//! - [`controller`] -- the per-job state machine and its control handle.
//! - [`registry`] -- job ids, routing of control signals, one active job
//!   per destination.
//! - [`chunk`] -- validates, deduplicates and submits one chunk.
//! - [`dedupe`] -- store lookup for existing keys.
//! - [`retry`] -- bounded re-attempts around chunk submission.
//! - [`store`] / [`source`] -- collaborator traits, plus the in-memory
//!   store in [`memory`] and a JSON file row source.

pub mod chunk;
pub mod controller;
pub mod dedupe;
pub mod error;
pub mod memory;
pub mod registry;
pub mod retry;
pub mod source;
pub mod store;

pub use controller::{BatchController, ControlSignal, ImportHandle, ImportRequest, JobControls};
pub use error::{PipelineError, SourceError, StoreError};
pub use memory::MemoryStore;
pub use registry::JobRegistry;
pub use source::{JsonFileSource, RowSource, StaticSource};
pub use store::{InsertOutcome, RejectedRow, Store};

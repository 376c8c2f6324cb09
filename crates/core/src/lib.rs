//! Domain types and pure logic for the chunked batch-import engine.
//!
//! Nothing in this crate performs I/O or spawns tasks. The async engine in
//! `registrar-pipeline` drives these building blocks:
//!
//! - [`job`] -- the live [`BatchJob`](job::BatchJob) snapshot and terminal
//!   [`ImportResult`](job::ImportResult).
//! - [`import_status`] -- the job lifecycle state machine.
//! - [`options`] -- caller-supplied import options and their range checks.
//! - [`validation`] -- field mapping, rule compilation and row evaluation.
//! - [`duplicate_detection`] -- key normalisation and chunk partitioning.
//! - [`retry`] -- bounded retry policy arithmetic.
//! - [`estimation`] -- throughput / ETA estimation.

pub mod dataset;
pub mod duplicate_detection;
pub mod error;
pub mod estimation;
pub mod import_status;
pub mod job;
pub mod options;
pub mod retry;
pub mod threshold_validation;
pub mod types;
pub mod validation;

//! Import event bus.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ImportEvent`] -- the envelope published for every job mutation.

pub mod bus;

pub use bus::{EventBus, EventKind, ImportEvent};

//! The label-driven ready-queue and the parallel dispatcher.
//!
//! The queue is an ephemeral projection of the `queued` label over the
//! store; the dispatcher fans queue items out to a [`Spawner`] with a
//! bounded worker pool and partial-failure accounting.

pub mod dispatcher;
pub mod queue;
pub mod spawner;

pub use dispatcher::{DispatchConfig, DispatchResult, Dispatcher, ItemError};
pub use queue::{QUEUE_LABEL, Queue, QueueItem};
pub use spawner::{NoopSpawner, Spawner};

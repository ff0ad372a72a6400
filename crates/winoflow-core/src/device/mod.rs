//! Execution queues and stage hand-off.
//!
//! - [`queue`]: the queue trait plus the inline and stream implementations
//! - [`pending`]: write-once slots carrying stage outputs

pub mod pending;
pub mod queue;

pub use pending::{pending, Pending, Promise};
pub use queue::{ExecutionQueue, InlineQueue, Job, QueueStats, StreamQueue};

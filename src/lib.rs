//! forkq - bounded FIFO task dispatch
//!
//! A fixed pool of worker threads servicing one shared FIFO of caller-owned
//! tasks, with pause/resume, drain, cancellation of pending work and a
//! blocking fork-join over batches.
//!
//! # Quick Start
//!
//! ```
//! use forkq::prelude::*;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct Square {
//!     input: u64,
//!     output: AtomicU64,
//! }
//!
//! impl Execute for Square {
//!     fn execute(&self) {
//!         self.output.store(self.input * self.input, Ordering::Relaxed);
//!     }
//! }
//!
//! let tasks: Vec<Task<Square>> = (1..=4)
//!     .map(|input| Task::new(Square { input, output: AtomicU64::new(0) }))
//!     .collect();
//!
//! let config = Config::builder().num_threads(2).build().unwrap();
//! let status = forkq::scope_with_config(config, |queue| {
//!     let batch: Vec<TaskRef<'_>> = tasks.iter().map(|t| t as TaskRef<'_>).collect();
//!     queue.fork_join(&batch)
//! })
//! .unwrap();
//!
//! assert_eq!(status, TaskStatus::Completed);
//! let sum: u64 = tasks.iter().map(|t| t.output.load(Ordering::Relaxed)).sum();
//! assert_eq!(sum, 1 + 4 + 9 + 16);
//! ```
//!
//! # Model
//!
//! - **Borrowed tasks**: the queue stores `&Task` references, never owned
//!   values. [`scope`] ties those borrows to the caller's frame and joins every
//!   worker before returning.
//! - **Lifecycle**: `None -> Queued -> Executing -> Completed`, or
//!   `Queued -> Dropped` when cancelled or torn down before running.
//! - **Panics**: a panicking task body is caught and the task still completes.
//! - **Bound**: an optional cap on pending tasks; a batch is admitted only while
//!   `pending + batch` stays strictly below it.
//! - **Logging**: lifecycle events go through `tracing`; install a subscriber
//!   to see them.

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod scope;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Rejected, Result};
pub use executor::{DynTask, Execute, Queue, Task, TaskId, TaskRef, TaskStatus};
pub use scope::{scope, scope_with_config};
pub use telemetry::MetricsSnapshot;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_basic_fork_join() {
        let log = Mutex::new(Vec::new());
        let a = Task::new(|| log.lock().push('a'));
        let b = Task::new(|| log.lock().push('b'));

        let status = scope(|queue| queue.fork_join(&[&a, &b])).unwrap();

        assert_eq!(status, TaskStatus::Completed);
        let mut seen = log.lock().clone();
        seen.sort();
        assert_eq!(seen, vec!['a', 'b']);
    }

    #[test]
    fn test_fork_join_empty() {
        let status = scope(|queue| queue.fork_join(&[])).unwrap();
        assert_eq!(status, TaskStatus::None);
    }
}

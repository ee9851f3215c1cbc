//! Task execution infrastructure.
//!
//! This module provides the task lifecycle, the worker dispatch loop and the
//! bounded FIFO queue that owns the workers.

pub(crate) mod panic_handler;
pub mod queue;
pub mod task;
pub mod worker;

pub use queue::{Queue, TaskRef};
pub use task::{DynTask, Execute, Task, TaskId, TaskStatus};
pub use worker::WorkerId;

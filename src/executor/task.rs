//! Task representation and lifecycle.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Unique identifier for a task, minted by a queue on first enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Id of a task that has never been enqueued.
    pub const NONE: TaskId = TaskId(0);

    pub(crate) fn from_raw(raw: u64) -> Self {
        debug_assert_ne!(raw, 0);
        TaskId(raw)
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("task#-")
        } else {
            write!(f, "task#{}", self.0)
        }
    }
}

/// Lifecycle state of a task.
///
/// `None -> Queued -> Executing -> Completed`, or `Queued -> Dropped` when the
/// task is cancelled before a worker picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TaskStatus {
    #[default]
    None = 0,
    Queued = 1,
    Dropped = 2,
    Executing = 3,
    Completed = 4,
}

impl TaskStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TaskStatus::Queued,
            2 => TaskStatus::Dropped,
            3 => TaskStatus::Executing,
            4 => TaskStatus::Completed,
            _ => TaskStatus::None,
        }
    }

    /// `Completed` and `Dropped` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Dropped)
    }
}

/// The body of a task. Called once per successful enqueue, on a worker thread.
///
/// Panics escaping `execute` are caught by the worker and discarded; record
/// failures inside the body if the caller needs them.
pub trait Execute: Send + Sync {
    fn execute(&self);
}

impl<F> Execute for F
where
    F: Fn() + Send + Sync,
{
    fn execute(&self) {
        self()
    }
}

/// A caller-owned unit of work.
///
/// The queue only ever borrows a task, so the task must live at least as long
/// as the [`scope`](crate::scope()) it is submitted in. The body is reachable
/// through `Deref`, which is how results stored by the body are read back.
pub struct Task<E: ?Sized> {
    id: AtomicU64,
    status: AtomicU8,
    busy: Mutex<bool>,
    idle: Condvar,
    body: E,
}

/// A task with its body type erased; what the queue stores.
pub type DynTask<'env> = Task<dyn Execute + 'env>;

impl<E> Task<E> {
    pub fn new(body: E) -> Self {
        Task {
            id: AtomicU64::new(0),
            status: AtomicU8::new(TaskStatus::None as u8),
            busy: Mutex::new(false),
            idle: Condvar::new(),
            body,
        }
    }

    pub fn into_inner(self) -> E {
        self.body
    }
}

impl<E: ?Sized> Task<E> {
    pub fn id(&self) -> TaskId {
        TaskId(self.id.load(Ordering::Acquire))
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// True from successful enqueue until the task is `Completed` or `Dropped`.
    pub fn is_busy(&self) -> bool {
        *self.busy.lock()
    }

    /// Blocks until the task is no longer busy. Returns at once if it is idle.
    pub fn wait(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.idle.wait(&mut busy);
        }
    }

    /// Like [`wait`](Self::wait) with an upper bound. Returns whether the
    /// task became idle in time.
    ///
    /// A timeout too large to express as a deadline waits without bound.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut busy = self.busy.lock();
        while *busy {
            if self.idle.wait_until(&mut busy, deadline).timed_out() {
                return !*busy;
            }
        }
        true
    }

    pub fn body(&self) -> &E {
        &self.body
    }

    // Queue-side transitions. Callers hold the queue lock except for
    // `begin`/`finalize`, which only the worker that popped the task calls.

    pub(crate) fn assign_id(&self, id: TaskId) {
        if self.id().is_none() {
            self.id.store(id.get(), Ordering::Release);
        }
    }

    pub(crate) fn mark_queued(&self) {
        let mut busy = self.busy.lock();
        self.set_status(TaskStatus::Queued);
        *busy = true;
    }

    pub(crate) fn begin(&self) {
        self.set_status(TaskStatus::Executing);
    }

    pub(crate) fn cancel(&self) {
        self.set_status(TaskStatus::Dropped);
        self.finalize();
    }

    pub(crate) fn finalize(&self) {
        if self.status() == TaskStatus::Executing {
            self.set_status(TaskStatus::Completed);
        }
        let mut busy = self.busy.lock();
        *busy = false;
        self.idle.notify_all();
    }

    fn set_status(&self, status: TaskStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}

impl<E: ?Sized> Deref for Task<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.body
    }
}

impl<E: Default> Default for Task<E> {
    fn default() -> Self {
        Task::new(E::default())
    }
}

impl<E: ?Sized> fmt::Debug for Task<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

use super::task::{DynTask, TaskId, TaskStatus};
use super::worker::{Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Rejected, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::slice;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::{debug, warn};

/// Borrowed reference to a caller-owned task.
pub type TaskRef<'env> = &'env DynTask<'env>;

pub(crate) struct Shared<'env> {
    pub(crate) state: Mutex<State<'env>>,
    /// Dispatch wake-ups: pending grew, pause lifted, or stop requested.
    pub(crate) work: Condvar,
    /// Signalled whenever `pending` may have become empty.
    pub(crate) drained: Condvar,
    pub(crate) metrics: Metrics,
}

pub(crate) struct State<'env> {
    pub(crate) pending: VecDeque<TaskRef<'env>>,
    pub(crate) paused: bool,
    pub(crate) draining: bool,
    pub(crate) stop: bool,
    /// Set when a respawn left fewer workers than configured.
    workers_lost: bool,
    last_id: u64,
}

impl<'env> Shared<'env> {
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                paused: false,
                draining: false,
                stop: false,
                workers_lost: false,
                last_id: 0,
            }),
            work: Condvar::new(),
            drained: Condvar::new(),
            metrics: Metrics::new(),
        }
    }
}

struct WorkerHandle<'scope> {
    id: WorkerId,
    thread: Option<ScopedJoinHandle<'scope, ()>>,
}

/// A fixed pool of worker threads servicing one FIFO of borrowed tasks.
///
/// Obtained through [`scope`](crate::scope()) or
/// [`scope_with_config`](crate::scope_with_config); the queue lives exactly as
/// long as the closure passed there, and every task handed to it must outlive
/// that closure. When the closure returns, still-pending tasks are dropped and
/// all workers are joined before the scope returns.
pub struct Queue<'scope, 'env: 'scope> {
    scope: &'scope Scope<'scope, 'env>,
    shared: Arc<Shared<'env>>,
    workers: Mutex<Vec<WorkerHandle<'scope>>>,
    config: Config,
    num_threads: usize,
    #[cfg(test)]
    spawn_limit: AtomicUsize,
}

impl<'scope, 'env> Queue<'scope, 'env> {
    pub(crate) fn new(scope: &'scope Scope<'scope, 'env>, config: Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();

        let queue = Self {
            scope,
            shared: Arc::new(Shared::new()),
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            config,
            num_threads,
            #[cfg(test)]
            spawn_limit: AtomicUsize::new(usize::MAX),
        };

        // on failure, Drop stops whatever did start
        queue.spawn_workers(&mut queue.workers.lock())?;

        Ok(queue)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn thread_count(&self) -> usize {
        self.num_threads
    }

    /// Pending-task bound, `None` if unbounded.
    pub fn max_elements(&self) -> Option<usize> {
        self.config.max_elements
    }

    pub fn enqueued_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enqueued_count() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    pub fn is_draining(&self) -> bool {
        self.shared.state.lock().draining
    }

    /// Whether a batch of `count` tasks would be accepted right now.
    ///
    /// A bounded queue only admits a batch while `pending + count` stays
    /// strictly below the bound, so at most `max - 1` tasks are ever pending.
    pub fn can_enqueue(&self, count: usize) -> bool {
        self.admit(&self.shared.state.lock(), count).is_ok()
    }

    pub fn enqueue(&self, task: TaskRef<'env>) -> std::result::Result<(), Rejected> {
        self.enqueue_batch(slice::from_ref(&task))
    }

    /// Submits `tasks` as one unit: either all of them are queued, in order,
    /// or none are and the reason is returned.
    ///
    /// Each task must be idle (not busy) and appear once in the batch.
    /// Breaking either is a bug in the caller and trips a debug assertion
    /// before any task of the batch is touched.
    pub fn enqueue_batch(&self, tasks: &[TaskRef<'env>]) -> std::result::Result<(), Rejected> {
        if tasks.is_empty() {
            return Ok(());
        }

        {
            let mut state = self.shared.state.lock();

            if let Err(rejected) = self.admit(&state, tasks.len()) {
                self.shared.metrics.record_rejected(tasks.len());
                return Err(rejected);
            }

            #[cfg(debug_assertions)]
            check_batch(tasks);

            for &task in tasks {
                if task.id().is_none() {
                    state.last_id += 1;
                    task.assign_id(TaskId::from_raw(state.last_id));
                }
                task.mark_queued();
            }

            state.pending.extend(tasks.iter().copied());
        }

        self.shared.metrics.record_enqueued(tasks.len());

        if tasks.len() > 1 {
            self.shared.work.notify_all();
        } else {
            self.shared.work.notify_one();
        }

        Ok(())
    }

    /// Enqueues `tasks` and blocks until every one of them is terminal.
    ///
    /// Returns `None` for an empty batch, `Dropped` if the batch was rejected
    /// or any member ended up dropped, and `Completed` otherwise.
    pub fn fork_join(&self, tasks: &[TaskRef<'env>]) -> TaskStatus {
        if tasks.is_empty() {
            return TaskStatus::None;
        }

        if self.enqueue_batch(tasks).is_err() {
            return TaskStatus::Dropped;
        }

        let mut status = TaskStatus::Completed;
        for task in tasks {
            task.wait();
            if task.status() == TaskStatus::Dropped {
                status = TaskStatus::Dropped;
            }
        }
        status
    }

    /// Stops workers from picking up pending tasks. Running tasks finish.
    pub fn pause(&self) {
        self.shared.state.lock().paused = true;
    }

    pub fn resume(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.paused {
                return;
            }
            state.paused = false;
        }
        self.shared.work.notify_all();
    }

    /// Runs every pending task to completion, then replaces the worker threads.
    ///
    /// Resumes a paused queue. Submissions are rejected with
    /// [`Rejected::Draining`] until this returns; afterwards the queue is
    /// empty, idle and accepting again.
    ///
    /// If a replacement worker fails to spawn, the error is returned and the
    /// queue rejects work with [`Rejected::WorkersLost`] until a later call
    /// succeeds.
    pub fn drain_and_wait(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            state.paused = false;
            state.draining = true;
        }
        self.shared.work.notify_all();

        {
            let mut state = self.shared.state.lock();
            while !state.pending.is_empty() {
                self.shared.drained.wait(&mut state);
            }
        }

        let (result, alive) = {
            let mut workers = self.workers.lock();
            self.stop_workers(&mut workers);
            let result = self.spawn_workers(&mut workers);
            (result, workers.len())
        };

        {
            let mut state = self.shared.state.lock();
            state.workers_lost = result.is_err();
            state.draining = false;
        }

        match &result {
            Ok(()) => debug!(threads = self.num_threads, "queue drained"),
            Err(e) => warn!(
                threads = self.num_threads,
                alive,
                error = %e,
                "respawn failed after drain; rejecting work"
            ),
        }

        result
    }

    /// Drops every pending task without running it. Returns how many were
    /// dropped. Tasks already executing are not affected.
    pub fn drop_enqueued(&self) -> usize {
        let dropped = {
            let mut state = self.shared.state.lock();
            let dropped = state.pending.len();
            for task in state.pending.drain(..) {
                task.cancel();
            }
            dropped
        };

        self.shared.drained.notify_all();

        if dropped > 0 {
            self.shared.metrics.record_dropped(dropped);
            debug!(dropped, "dropped pending tasks");
        }

        dropped
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn admit(&self, state: &State<'env>, count: usize) -> std::result::Result<(), Rejected> {
        if state.draining {
            return Err(Rejected::Draining);
        }
        if state.workers_lost {
            return Err(Rejected::WorkersLost);
        }

        let pending = state.pending.len();
        match self.config.max_elements {
            // an overflowing sum never fits
            Some(max) if pending.checked_add(count).map_or(true, |total| total >= max) => {
                Err(Rejected::Full {
                    pending,
                    requested: count,
                    max,
                })
            }
            _ => Ok(()),
        }
    }

    fn spawn_workers(&self, workers: &mut Vec<WorkerHandle<'scope>>) -> Result<()> {
        for id in 0..self.num_threads {
            #[cfg(test)]
            if id >= self.spawn_limit.load(Ordering::Relaxed) {
                return Err(Error::executor(format!(
                    "spawn failed: worker {} refused",
                    id
                )));
            }

            let worker = Worker::new(id, Arc::clone(&self.shared));
            let name = format!("{}-{}", self.config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = self.config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let thread = builder
                .spawn_scoped(self.scope, move || worker.run())
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

            workers.push(WorkerHandle {
                id,
                thread: Some(thread),
            });
        }

        debug!(threads = self.num_threads, "spawned workers");
        Ok(())
    }

    fn stop_workers(&self, workers: &mut Vec<WorkerHandle<'scope>>) {
        self.shared.state.lock().stop = true;

        // wake everyone up to check the stop flag
        self.shared.work.notify_all();

        for worker in workers.iter_mut() {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!(worker = worker.id, "worker thread panicked");
                }
            }
        }
        workers.clear();

        self.shared.state.lock().stop = false;
    }
}

/// Every task in a batch must be idle and must not repeat.
#[cfg(debug_assertions)]
fn check_batch(tasks: &[TaskRef<'_>]) {
    for (i, &task) in tasks.iter().enumerate() {
        debug_assert!(!task.is_busy(), "{} enqueued while busy", task.id());
        let addr = task as *const DynTask<'_> as *const ();
        debug_assert!(
            !tasks[..i]
                .iter()
                .any(|&other| other as *const DynTask<'_> as *const () == addr),
            "{} appears twice in one batch",
            task.id()
        );
    }
}

impl Drop for Queue<'_, '_> {
    fn drop(&mut self) {
        self.drop_enqueued();
        let mut workers = self.workers.lock();
        self.stop_workers(&mut workers);
    }
}

impl fmt::Debug for Queue<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Queue")
            .field("num_threads", &self.num_threads)
            .field("max_elements", &self.config.max_elements)
            .field("pending", &state.pending.len())
            .field("paused", &state.paused)
            .field("draining", &state.draining)
            .field("workers_lost", &state.workers_lost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::executor::task::{Task, TaskStatus};
    use crate::{scope_with_config, Config, Error, Rejected};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(threads: usize) -> Config {
        Config::builder().num_threads(threads).build().unwrap()
    }

    #[test]
    fn test_enqueue_runs_task() {
        let hits = AtomicUsize::new(0);
        let task = Task::new(|| {
            hits.fetch_add(1, Ordering::Relaxed);
        });

        scope_with_config(config(2), |queue| {
            queue.enqueue(&task).unwrap();
            task.wait();
        })
        .unwrap();

        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_ids_are_monotonic_and_stable() {
        let a = Task::new(|| {});
        let b = Task::new(|| {});

        scope_with_config(config(1), |queue| {
            assert_eq!(queue.fork_join(&[&a, &b]), TaskStatus::Completed);
            let (id_a, id_b) = (a.id(), b.id());
            assert!(!id_a.is_none());
            assert!(id_a < id_b);

            queue.enqueue(&a).unwrap();
            a.wait();
            assert_eq!(a.id(), id_a);
        })
        .unwrap();
    }

    #[test]
    fn test_pause_holds_pending() {
        let ran = AtomicBool::new(false);
        let task = Task::new(|| ran.store(true, Ordering::SeqCst));

        scope_with_config(config(2), |queue| {
            queue.pause();
            assert!(queue.is_paused());
            queue.enqueue(&task).unwrap();

            assert!(!task.wait_timeout(Duration::from_millis(50)));
            assert_eq!(queue.enqueued_count(), 1);
            assert_eq!(task.status(), TaskStatus::Queued);

            queue.resume();
            task.wait();
        })
        .unwrap();

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_teardown_drops_pending() {
        let task = Task::new(|| {});

        scope_with_config(config(1), |queue| {
            queue.pause();
            queue.enqueue(&task).unwrap();
            assert!(task.is_busy());
        })
        .unwrap();

        assert_eq!(task.status(), TaskStatus::Dropped);
        assert!(!task.is_busy());
    }

    #[test]
    fn test_debug_shows_state() {
        scope_with_config(config(1), |queue| {
            queue.pause();
            let text = format!("{:?}", queue);
            assert!(text.contains("paused: true"));
            assert!(text.contains("num_threads: 1"));
        })
        .unwrap();
    }

    #[test]
    fn test_capacity_sum_saturates() {
        let task = Task::new(|| {});
        let bounded = Config::builder()
            .num_threads(1)
            .max_elements(4)
            .build()
            .unwrap();

        scope_with_config(bounded, |queue| {
            queue.pause();
            queue.enqueue(&task).unwrap();

            assert!(!queue.can_enqueue(usize::MAX));
            assert!(!queue.can_enqueue(usize::MAX - 1));
            assert!(queue.can_enqueue(2));
        })
        .unwrap();

        scope_with_config(config(1), |queue| {
            assert!(queue.can_enqueue(usize::MAX));
        })
        .unwrap();
    }

    #[test]
    fn test_failed_respawn_rejects_until_next_drain() {
        let hits = AtomicUsize::new(0);
        let task = Task::new(|| {
            hits.fetch_add(1, Ordering::Relaxed);
        });

        scope_with_config(config(2), |queue| {
            // the last worker of the fresh set fails to start
            let limit = queue.thread_count() - 1;
            queue.spawn_limit.store(limit, Ordering::Relaxed);

            let result = queue.drain_and_wait();
            assert!(matches!(result, Err(Error::Executor(_))));
            assert_eq!(queue.workers.lock().len(), limit);
            assert!(!queue.is_draining());

            assert!(!queue.can_enqueue(1));
            assert_eq!(queue.enqueue(&task), Err(Rejected::WorkersLost));
            assert_eq!(queue.fork_join(&[&task]), TaskStatus::Dropped);
            assert_eq!(task.status(), TaskStatus::None);
            assert!(task.id().is_none());

            queue.spawn_limit.store(usize::MAX, Ordering::Relaxed);
            queue.drain_and_wait().unwrap();
            assert_eq!(queue.workers.lock().len(), queue.thread_count());

            assert_eq!(queue.fork_join(&[&task]), TaskStatus::Completed);
        })
        .unwrap();

        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failed_respawn_with_no_workers() {
        let task = Task::new(|| {});

        scope_with_config(config(1), |queue| {
            queue.spawn_limit.store(0, Ordering::Relaxed);
            assert!(queue.drain_and_wait().is_err());
            assert!(queue.workers.lock().is_empty());
            assert_eq!(queue.enqueue(&task), Err(Rejected::WorkersLost));
            assert!(queue.is_empty());
        })
        .unwrap();

        assert_eq!(task.status(), TaskStatus::None);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_busy_member_leaves_batch_untouched() {
        let idle = Task::new(|| {});
        let busy = Task::new(|| {});

        scope_with_config(config(1), |queue| {
            queue.pause();
            queue.enqueue(&busy).unwrap();

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                queue.enqueue_batch(&[&idle, &busy])
            }));
            assert!(result.is_err());

            assert_eq!(idle.status(), TaskStatus::None);
            assert!(!idle.is_busy());
            assert!(idle.id().is_none());
            assert_eq!(queue.enqueued_count(), 1);
        })
        .unwrap();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_repeated_member_leaves_batch_untouched() {
        let task = Task::new(|| {});

        scope_with_config(config(1), |queue| {
            queue.pause();

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                queue.enqueue_batch(&[&task, &task])
            }));
            assert!(result.is_err());

            assert_eq!(task.status(), TaskStatus::None);
            assert!(!task.is_busy());
            assert!(queue.is_empty());
        })
        .unwrap();
    }
}

// worker thread stuff
use super::panic_handler;
use super::task::Execute;
use super::queue::{Shared, TaskRef};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

pub type WorkerId = usize;

pub(crate) struct Worker<'env> {
    pub id: WorkerId,
    shared: Arc<Shared<'env>>,
}

impl<'env> Worker<'env> {
    pub fn new(id: WorkerId, shared: Arc<Shared<'env>>) -> Self {
        Self { id, shared }
    }

    // main loop
    pub fn run(self) {
        trace!(worker = self.id, "worker started");

        while let Some((task, observed_empty)) = self.next_task() {
            self.execute_task(task);

            if observed_empty {
                self.shared.drained.notify_all();
            }
        }

        trace!(worker = self.id, "worker stopped");
    }

    /// Blocks until a task can be dispatched. `None` means stop.
    fn next_task(&self) -> Option<(TaskRef<'env>, bool)> {
        let mut state = self.shared.state.lock();
        loop {
            if state.stop {
                return None;
            }

            if !state.paused {
                if let Some(task) = state.pending.pop_front() {
                    return Some((task, state.pending.is_empty()));
                }
            }

            self.shared.work.wait(&mut state);
        }
    }

    fn execute_task(&self, task: TaskRef<'env>) {
        task.begin();
        let start = Instant::now();

        // panics are swallowed; the task completes either way
        let result = panic_handler::isolate(|| task.body().execute());

        let duration_ns = start.elapsed().as_nanos() as u64;
        self.shared.metrics.record_task_execution(duration_ns);
        if result.is_err() {
            self.shared.metrics.record_task_panic();
        }

        task.finalize();
    }
}

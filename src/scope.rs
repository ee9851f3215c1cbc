use crate::config::Config;
use crate::error::Result;
use crate::executor::Queue;
use std::thread;

/// Runs `f` with a queue built from the default [`Config`].
///
/// See [`scope_with_config`].
pub fn scope<'env, F, R>(f: F) -> Result<R>
where
    F: for<'scope> FnOnce(&Queue<'scope, 'env>) -> R,
{
    scope_with_config(Config::default(), f)
}

/// Creates a queue, hands it to `f`, and tears it down when `f` returns.
///
/// Tasks submitted inside `f` are borrowed, not owned, so they must be created
/// before the scope opens:
///
/// ```
/// use forkq::prelude::*;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let total = AtomicUsize::new(0);
/// let a = Task::new(|| { total.fetch_add(1, Ordering::Relaxed); });
/// let b = Task::new(|| { total.fetch_add(2, Ordering::Relaxed); });
///
/// let status = forkq::scope(|queue| queue.fork_join(&[&a, &b])).unwrap();
///
/// assert_eq!(status, TaskStatus::Completed);
/// assert_eq!(total.load(Ordering::Relaxed), 3);
/// ```
///
/// On the way out, tasks still pending are marked `Dropped` and every worker
/// thread is joined, so no task is touched after this returns. The same
/// happens if `f` panics, before the panic resumes.
pub fn scope_with_config<'env, F, R>(config: Config, f: F) -> Result<R>
where
    F: for<'scope> FnOnce(&Queue<'scope, 'env>) -> R,
{
    thread::scope(|s| -> Result<R> {
        let queue = Queue::new(s, config)?;
        Ok(f(&queue))
    })
}

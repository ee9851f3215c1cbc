use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

/// Runs `f`, turning a panic into an `Err` instead of unwinding further.
///
/// Workers call task bodies through this so a misbehaving body cannot take the
/// worker thread down with it. The payload is handed back untouched; the
/// queue only counts panics.
pub(crate) fn isolate<F, R>(f: F) -> thread::Result<R>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f))
}

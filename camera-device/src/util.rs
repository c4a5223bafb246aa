use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub(crate) fn log_panic(panic: Box<dyn Any + Send>) {
    if let Some(panic) = panic.downcast_ref::<String>() {
        log::error!("Callback panicked: {panic}");
    } else if let Some(panic) = panic.downcast_ref::<&str>() {
        log::error!("Callback panicked: {panic}");
    } else {
        log::error!("Callback panicked with a non-string payload");
    }
}

/// Runs application callback code, containing (and logging) any panic so it
/// can't unwind into an executor's dispatch loop.
pub(crate) fn run_guarded<F: FnOnce()>(f: F) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        log_panic(panic);
    }
}

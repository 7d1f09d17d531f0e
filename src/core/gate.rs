//! Purpose: Serialize every call into the non-reentrant engine.
//! Exports: `exec`, `exec_with_name`.
//! Role: The only path from safe wrappers to `core::sys`.
//! Invariants: One process-wide lock; a guard wraps one engine call, plus at most the
//! inquiry that sizes its buffer.
//! Invariants: The name scratch buffer lives inside the lock and is copied out before release.
//! Invariants: Calls never nest; a closure passed here must not re-enter the gate.
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::sys::NC_MAX_NAME;

struct CallContext {
    name: [c_char; NC_MAX_NAME + 1],
}

static GATE: Mutex<CallContext> = Mutex::new(CallContext {
    name: [0; NC_MAX_NAME + 1],
});

#[cfg(test)]
thread_local! {
    static CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

fn acquire(op: &'static str) -> MutexGuard<'static, CallContext> {
    #[cfg(test)]
    CALLS.with(|calls| calls.set(calls.get() + 1));
    let guard = GATE.lock().unwrap_or_else(PoisonError::into_inner);
    tracing::trace!(op, "engine call");
    guard
}

/// Run one engine call under the process-wide lock and return its raw status.
pub fn exec(op: &'static str, call: impl FnOnce() -> c_int) -> c_int {
    let _guard = acquire(op);
    let status = call();
    if status != 0 {
        tracing::trace!(op, status, "engine status");
    }
    status
}

/// Run one engine call that writes a name into the shared scratch buffer.
///
/// The name is copied into an owned string while the lock is still held.
pub fn exec_with_name(op: &'static str, call: impl FnOnce(*mut c_char) -> c_int) -> (c_int, String) {
    let mut guard = acquire(op);
    guard.name[0] = 0;
    let status = call(guard.name.as_mut_ptr());
    guard.name[NC_MAX_NAME] = 0;
    let name = unsafe { CStr::from_ptr(guard.name.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    if status != 0 {
        tracing::trace!(op, status, "engine status");
    }
    (status, name)
}

/// Number of gated calls issued by the current thread.
#[cfg(test)]
pub(crate) fn calls_on_this_thread() -> usize {
    CALLS.with(|calls| calls.get())
}

//! Scoped mutual exclusion built on top of [`crate::port`].
//!
//! Mirrors the source project's `tbxcritsect.c`: `enter`/`exit` around a single process-wide
//! saved-state slot. The slot is deliberately **not** reentrant — a caller that needs nested
//! critical sections must save the `CpuSr` itself rather than relying on this module's shared
//! slot, exactly as the distilled spec requires. Every mutator in this crate instead goes
//! through [`Guard`], an RAII wrapper that calls [`enter`] on construction and [`exit`] on
//! drop, so a mutator can never forget to release the section on an early return or a panic
//! unwind.

use crate::port::{CpuSr, DefaultPort, Port};
use core::cell::UnsafeCell;

struct Slot(UnsafeCell<Option<CpuSr>>);

// SAFETY: `Slot` is only ever read or written while the current execution context holds the
// critical section (i.e. between a matching `enter`/`exit` pair). `Port::disable` guarantees
// that only one context system-wide is "inside" at a time, so there is never a second
// concurrent accessor to race with.
unsafe impl Sync for Slot {}

static SAVED_STATE: Slot = Slot(UnsafeCell::new(None));

/// Enters the critical section: masks interrupts (or locks the hosted mutex) via
/// [`Port::disable`] and stashes the returned state in the shared slot.
///
/// Prefer [`Guard::acquire`] over calling this directly; it guarantees the matching `exit`
/// runs even if the guarded code returns early or unwinds.
pub fn enter() {
    let prev = DefaultPort::disable();
    // SAFETY: see `Slot`'s safety comment; we are the sole accessor until `exit` runs.
    unsafe {
        *SAVED_STATE.0.get() = Some(prev);
    }
}

/// Exits the critical section: reads and clears the saved state, then restores it via
/// [`Port::restore`].
///
/// Calling `exit` without a matching prior `enter` is a precondition violation, reported
/// through [`crate::tbx_assert!`].
pub fn exit() {
    // SAFETY: see `Slot`'s safety comment.
    let prev = unsafe { (*SAVED_STATE.0.get()).take() };
    match prev {
        Some(p) => DefaultPort::restore(p),
        None => crate::tbx_assert!(false),
    }
}

/// RAII handle for a held critical section: [`Guard::acquire`] calls [`enter`], and dropping
/// the guard calls [`exit`]. This is the discipline every mutator in this crate follows —
/// acquire exactly once, at the outermost public entry point, and let the guard's `Drop`
/// release it.
#[must_use = "the critical section is released when this guard is dropped; binding it to `_` \
              releases it immediately"]
pub struct Guard {
    _private: (),
}

impl Guard {
    /// Enters the critical section and returns a guard that will exit it on drop.
    pub fn acquire() -> Guard {
        enter();
        Guard { _private: () }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_exit_round_trips() {
        enter();
        exit();
    }

    #[test]
    fn guard_releases_on_drop() {
        {
            let _guard = Guard::acquire();
        }
        // A second acquisition must succeed, proving the first one released the section.
        let _guard = Guard::acquire();
    }

    #[test]
    fn guard_releases_on_early_return_via_closure() {
        fn inner() -> Option<()> {
            let _guard = Guard::acquire();
            None?;
            Some(())
        }
        let _ = inner();
        let _guard = Guard::acquire();
    }
}

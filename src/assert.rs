//! Run-time assertions with a pluggable handler.
//!
//! Mirrors the source project's `tbxassert.c`: a single global handler, defaulting to an
//! infinite loop, invoked by the [`tbx_assert!`](crate::tbx_assert) macro whenever a checked
//! condition is false. Compiling without the `assertions` Cargo feature turns the macro into
//! a no-op that does not evaluate its argument, exactly like building the C sources with
//! `NDEBUG`.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Signature of a function that may be installed as the assertion handler.
///
/// Receives the file and line of the failed `tbx_assert!` call site. Default implementations
/// never return; a user handler that logs and then resets the target does not need to honor
/// that, but one that merely logs and returns will cause the triggering operation to continue
/// as if the assertion had not fired, which is almost never what's wanted.
pub type Handler = fn(file: &'static str, line: u32);

/// Spins forever. Installed by default, matching the source project's default behavior: halt
/// so a debugger or a watchdog can take over.
fn default_handler(_file: &'static str, _line: u32) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

// Function pointers are exactly pointer-width and never null, so they round-trip through an
// AtomicUsize without a lock. Prefer the narrowest atomic that fits instead of a mutex around
// a fn-pointer cell.
static HANDLER: AtomicUsize = AtomicUsize::new(default_handler as usize);

/// Installs a new application-specific assertion handler, replacing whichever handler is
/// currently active.
///
/// Unlike the C version, there is no null-handler precondition to enforce: a Rust function
/// pointer can never be null, so this function cannot fail.
pub fn set_handler(handler: Handler) {
    HANDLER.store(handler as usize, Ordering::SeqCst);
}

/// Invokes the currently installed assertion handler. Called by [`tbx_assert!`] on failure;
/// not normally called directly.
#[cold]
pub fn trigger(file: &'static str, line: u32) {
    let ptr = HANDLER.load(Ordering::SeqCst);
    // SAFETY: the only values ever stored are `default_handler` and handlers passed through
    // `set_handler`, both valid `Handler` function pointers.
    let handler: Handler = unsafe { core::mem::transmute(ptr) };
    handler(file, line);
}

/// Checks a boolean invariant; on failure, invokes the installed assertion handler with the
/// call site's file and line.
///
/// When the `assertions` Cargo feature is disabled, this expands to nothing and `$cond` is
/// not evaluated, matching the source project's `ASSERTIONS_ENABLE = 0` build configuration.
#[macro_export]
macro_rules! tbx_assert {
    ($cond:expr) => {{
        #[cfg(feature = "assertions")]
        {
            if !($cond) {
                $crate::assert::trigger(file!(), line!());
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    static CALLED: AtomicBool = AtomicBool::new(false);
    // The handler is process-wide, so serialize tests that install one.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn recording_handler(_file: &'static str, _line: u32) {
        CALLED.store(true, Ordering::SeqCst);
    }

    #[test]
    fn passes_silently_when_condition_holds() {
        let _guard = TEST_LOCK.lock().unwrap();
        CALLED.store(false, Ordering::SeqCst);
        set_handler(recording_handler);
        tbx_assert!(1 + 1 == 2);
        assert!(!CALLED.load(Ordering::SeqCst));
        set_handler(|_, _| loop {
            core::hint::spin_loop()
        });
    }

    #[test]
    fn invokes_handler_when_condition_fails() {
        let _guard = TEST_LOCK.lock().unwrap();
        CALLED.store(false, Ordering::SeqCst);
        set_handler(recording_handler);
        tbx_assert!(1 + 1 == 3);
        assert!(CALLED.load(Ordering::SeqCst));
        set_handler(|_, _| loop {
            core::hint::spin_loop()
        });
    }
}

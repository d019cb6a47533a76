//! Platform port: interrupt masking (bare metal) or mutual exclusion (hosted), selected at
//! compile time by Cargo feature.
//!
//! This is the thinnest layer in the crate and the one every other module ultimately
//! synchronizes through via [`crate::critical_section`]. The source project picks its `Port`
//! implementation per target directory (`source/port/LINUX`, `source/port/ST_STM32`, ...);
//! this crate picks it per Cargo feature instead.

/// A platform-sized value capable of recording whether interrupts (or, on a hosted port,
/// this thread's ownership of the critical section) were enabled prior to a `disable` call.
pub type CpuSr = usize;

/// Value `disable` returns when it found the previous state enabled / unlocked.
const ENABLED: CpuSr = 1;
/// Value `disable` returns when it found the previous state already disabled / locked
/// (i.e. this call nests inside an outer one on the same thread).
const ALREADY_DISABLED: CpuSr = 0;

/// The interrupt-masking / mutual-exclusion contract every port implementation satisfies.
pub trait Port {
    /// Captures the current interrupt-enable state and masks interrupts (or locks the
    /// process-wide mutex, on a hosted port), returning the captured prior state.
    fn disable() -> CpuSr;

    /// Restores interrupt-enable state to exactly what the matching `disable` call captured.
    fn restore(prev: CpuSr);

    /// Optional hook a platform port overrides to arm its system tick timer. Defaults to
    /// doing nothing; no core module depends on this being called.
    fn system_tick_init() {}
}

#[cfg(feature = "std")]
mod std_port {
    use super::{CpuSr, Port, ALREADY_DISABLED, ENABLED};
    use parking_lot::RawMutex;
    use std::cell::Cell;

    // `RawMutex` exposes bare `lock`/`unlock`, not an owning guard, which is exactly the
    // shape the original `pthread_mutex_t`-based port needs: the "guard" here is the
    // returned `CpuSr`, tracked by the caller, not a Rust-lifetime-scoped object.
    static MUTEX: RawMutex = RawMutex::INIT;

    thread_local! {
        // Same-thread nesting depth. A thread that calls `disable` while it already holds
        // the mutex (e.g. from within an assertion handler invoked during a critical
        // section) must not attempt to lock it again -- that would deadlock a non-reentrant
        // mutex. Only the outermost `disable` on a given thread actually takes the lock.
        static DEPTH: Cell<u32> = const { Cell::new(0) };
    }

    /// Hosted port: simulates interrupt masking with a process-wide raw mutex plus a
    /// thread-local nesting depth, following the same "lock/unlock pair must be perfectly
    /// nested" contract the source project's LINUX port documents.
    pub struct StdPort;

    impl Port for StdPort {
        fn disable() -> CpuSr {
            let depth = DEPTH.with(|d| d.get());
            if depth == 0 {
                MUTEX.lock();
            }
            DEPTH.with(|d| d.set(depth + 1));
            if depth == 0 {
                ENABLED
            } else {
                ALREADY_DISABLED
            }
        }

        fn restore(prev: CpuSr) {
            let depth = DEPTH.with(|d| d.get());
            crate::tbx_assert!(depth > 0);
            if depth == 0 {
                return;
            }
            DEPTH.with(|d| d.set(depth - 1));
            if prev == ENABLED {
                // SAFETY: `prev == ENABLED` only for the thread that actually locked
                // `MUTEX` in the matching `disable` call, and `depth` just dropped to 0 for
                // that same thread, so this thread is the lock's sole owner.
                unsafe { MUTEX.unlock() };
            }
        }
    }
}

#[cfg(feature = "std")]
pub use std_port::StdPort;

#[cfg(feature = "cortex-m")]
mod cortex_m_port {
    use super::{CpuSr, Port, ALREADY_DISABLED, ENABLED};

    /// Bare-metal port for ARM Cortex-M: masks interrupts via the PRIMASK register instead
    /// of simulating mutual exclusion with a mutex.
    pub struct CortexMPort;

    impl Port for CortexMPort {
        fn disable() -> CpuSr {
            let was_enabled = cortex_m::register::primask::read().is_active();
            cortex_m::interrupt::disable();
            if was_enabled {
                ENABLED
            } else {
                ALREADY_DISABLED
            }
        }

        fn restore(prev: CpuSr) {
            if prev == ENABLED {
                // SAFETY: re-enabling interrupts is only unsound if it breaks a critical
                // section an inner caller is still relying on; the single-slot discipline
                // in `critical_section` guarantees `restore` is only called by the context
                // that owns the current section.
                unsafe { cortex_m::interrupt::enable() };
            }
        }
    }
}

#[cfg(feature = "cortex-m")]
pub use cortex_m_port::CortexMPort;

cfg_if::cfg_if! {
    if #[cfg(feature = "cortex-m")] {
        /// The `Port` implementation selected for this build.
        pub type DefaultPort = CortexMPort;
    } else if #[cfg(feature = "std")] {
        /// The `Port` implementation selected for this build.
        pub type DefaultPort = StdPort;
    } else {
        compile_error!("microtbx requires either the `std` or the `cortex-m` feature to select a Port implementation");
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn disable_then_restore_round_trips() {
        let prev = StdPort::disable();
        StdPort::restore(prev);
    }

    #[test]
    fn nested_disable_on_same_thread_does_not_deadlock() {
        let outer = StdPort::disable();
        let inner = StdPort::disable();
        StdPort::restore(inner);
        StdPort::restore(outer);
    }
}

//! A freestanding toolbox of runtime primitives for small and resource-constrained targets:
//! a portable critical section, a bump heap allocator, a pool-based allocator layered on top
//! of it, and a doubly-linked list layered on top of that.
//!
//! These four pieces are meant to be used together through [`Toolbox`], a single value that
//! owns the whole dependency graph instead of relying on implicit process-wide globals:
//!
//! ```
//! use microtbx::Toolbox;
//!
//! let toolbox: Toolbox<4096> = Toolbox::new();
//!
//! let list = toolbox.create_list().expect("heap has room for the list's bookkeeping block");
//! let a = 1usize as *mut core::ffi::c_void;
//! list.insert_back(a).unwrap();
//! assert_eq!(list.len(), 1);
//! ```
//!
//! Firmware that wants a single process-wide instance instead of threading a `&Toolbox`
//! through its call graph can use the [`toolbox!`] macro to declare one as a `static`.
//!
//! # Feature flags
//!
//! - `std` (default): selects the hosted [`Port`](port::Port) implementation, a
//!   `parking_lot`-backed mutex standing in for interrupt masking. Required on any target
//!   without the `cortex-m` feature.
//! - `cortex-m`: selects the bare-metal `Port` implementation, built on the Cortex-M PRIMASK
//!   register.
//! - `assertions` (default): compiles [`tbx_assert!`] checks in. Disabling it compiles every
//!   `tbx_assert!` call to nothing, matching the source project's `ASSERTIONS_ENABLE = 0`
//!   build configuration.
//! - `log`: emits [`log`] facade records at pool-growth and exhaustion points.
//!
//! Exactly one of `std` or `cortex-m` must be enabled to select a [`Port`](port::Port).
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

pub mod assert;
pub mod critical_section;
pub mod error;
pub mod heap;
pub mod list;
pub mod pool;
pub mod port;
mod toolbox;

pub use critical_section::Guard;
pub use error::Error;
pub use heap::Heap;
pub use list::{Item, List};
pub use pool::MemPool;
pub use port::Port;
pub use toolbox::Toolbox;

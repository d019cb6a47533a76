//! The composite object tying a [`Heap`], a [`MemPool`] registry and list support together
//! into one independently constructible value.
//!
//! The source project keeps its heap, pool registry and list-support pools as implicit
//! process-wide globals. `Toolbox<HEAP_SIZE>` makes that dependency graph an explicit value
//! instead, so a firmware image -- or a test -- can hold more than one, each fully isolated
//! except for the one genuinely global resource: the critical section itself (see
//! `crate::critical_section`), which models a single CPU's interrupt-mask state and so cannot
//! be "per-instance" on bare metal.

use crate::error::Error;
use crate::heap::Heap;
use crate::list::List;
use crate::pool::MemPool;
use core::ptr::NonNull;

/// Owns one bump heap and one pool registry, and is the entry point for everything this
/// crate exposes above the critical-section primitive.
///
/// `HEAP_SIZE` is this crate's replacement for the source project's `TBX_HEAP_SIZE` build
/// configuration define.
pub struct Toolbox<const HEAP_SIZE: usize> {
    heap: Heap<HEAP_SIZE>,
    pools: MemPool,
}

impl<const HEAP_SIZE: usize> Toolbox<HEAP_SIZE> {
    /// Creates a new, empty toolbox. Usable in a `const` context so a `Toolbox` can be held
    /// in a `static`; see the [`toolbox!`] macro for the common case of a single
    /// process-wide instance.
    pub const fn new() -> Self {
        Toolbox {
            heap: Heap::new(),
            pools: MemPool::new(),
        }
    }

    /// The bump heap backing this toolbox's pools.
    pub fn heap(&self) -> &Heap<HEAP_SIZE> {
        &self.heap
    }

    /// The pool registry backing this toolbox's own allocations and, internally, its lists'
    /// list-object and item-node storage.
    pub fn pools(&self) -> &MemPool {
        &self.pools
    }

    /// Creates (or grows, if one already exists) a pool of `block_size`-byte blocks and
    /// allocates `num_blocks` fresh blocks into it.
    pub fn pool_create(&self, num_blocks: usize, block_size: usize) -> Result<(), Error> {
        self.pools.create(&self.heap, num_blocks, block_size)
    }

    /// Allocates a block of at least `size` bytes from the pool registry.
    pub fn pool_allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.pools.allocate(size)
    }

    /// Returns a block previously obtained from [`Toolbox::pool_allocate`].
    ///
    /// # Safety
    ///
    /// Same contract as [`MemPool::release`].
    pub unsafe fn pool_release(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarding the caller's contract.
        unsafe { self.pools.release(ptr) }
    }

    /// Allocates `size` bytes directly from the heap, bypassing the pool layer.
    pub fn heap_allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.heap.allocate(size)
    }

    /// Creates a new, empty doubly-linked list backed by this toolbox's pools.
    ///
    /// Returns `None` only if the heap is exhausted before the list's first list-object
    /// block can be carved out.
    pub fn create_list(&self) -> Option<List<'_, HEAP_SIZE>> {
        List::create(self)
    }

    /// Allocates a block of exactly `size` bytes, creating a 1-block pool of that size first
    /// if none exists yet, and growing the existing pool by one and retrying exactly once if
    /// it is exhausted. The whole attempt runs under a single critical section.
    ///
    /// This is the allocator discipline `crate::list` uses for its list-object and item-node
    /// storage; it is exposed at the toolbox level (rather than on `MemPool` directly)
    /// because it needs both the pool registry and the heap that backs it.
    pub(crate) fn pool_allocate_or_grow(&self, size: usize) -> Result<NonNull<u8>, Error> {
        let _guard = crate::critical_section::Guard::acquire();
        if let Some(p) = self.pools.allocate_locked(size) {
            return Ok(p);
        }
        self.pools.create_locked(&self.heap, 1, size)?;
        self.pools.allocate_locked(size).ok_or(Error::Exhausted)
    }
}

impl<const HEAP_SIZE: usize> Default for Toolbox<HEAP_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Instantiates a [`Toolbox`] as a global, process-wide singleton.
///
/// Modeled on the classic `pool!`-style singleton macro: firmware that wants the
/// classic "just call a free function against one global instance" ergonomics can name a
/// static instead of threading a `&Toolbox` through its whole call graph. Unlike that style of
/// macro, no unsafe indirection is needed here -- `Toolbox` is `Sync` outright, since every
/// field it owns only mutates behind the crate's critical section.
///
/// ```
/// microtbx::toolbox!(FIRMWARE: 4096);
///
/// let list = FIRMWARE.create_list().unwrap();
/// assert_eq!(list.len(), 0);
/// ```
#[macro_export]
macro_rules! toolbox {
    ($name:ident: $size:expr) => {
        static $name: $crate::Toolbox<{ $size }> = $crate::Toolbox::new();
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_allocate_or_grow_creates_pool_on_first_use() {
        let toolbox: Toolbox<4096> = Toolbox::new();
        let p = toolbox.pool_allocate_or_grow(16).unwrap();
        unsafe { toolbox.pool_release(p) };
    }

    #[test]
    fn pool_allocate_or_grow_grows_existing_pool_when_exhausted() {
        let toolbox: Toolbox<4096> = Toolbox::new();
        let a = toolbox.pool_allocate_or_grow(16).unwrap();
        // The 1-block pool created above is now empty; this must grow it rather than fail.
        let b = toolbox.pool_allocate_or_grow(16).unwrap();
        assert_ne!(a.as_ptr(), b.as_ptr());
        unsafe {
            toolbox.pool_release(a);
            toolbox.pool_release(b);
        }
    }

    #[test]
    fn toolbox_singleton_macro_produces_a_usable_static() {
        toolbox!(TEST_TOOLBOX: 2048);
        let list = TEST_TOOLBOX.create_list().unwrap();
        assert_eq!(list.len(), 0);
    }
}

//! Pool-based allocator layered on [`crate::heap`]: a registry of fixed-block-size pools,
//! ordered ascending by block size, supporting best-fit allocation and O(1) release.
//!
//! Mirrors the source project's `tbxmempool.c`. Every block handed out carries a hidden
//! header (one machine word) recording its owning pool's block size immediately before the
//! payload, so `release` can recover which pool a pointer belongs to without the caller
//! repeating the size.

use crate::critical_section::Guard;
use crate::error::Error;
use crate::heap::Heap;
use core::cell::UnsafeCell;
use core::mem;
use core::ptr::{self, NonNull};

#[repr(C)]
struct BlockHeader {
    size: usize,
}

/// A free-list / used-list cell. Node cells are never returned to the heap: once the heap
/// allocates one it migrates between a pool's `free` and `used` lists for the life of the
/// program. On `release`, a node is popped from `used` (not necessarily the one originally
/// handed out for this block) and re-pointed at the released block -- the `used` list is a
/// pool of spare node cells, not a log of individual allocations.
struct Node {
    next: *mut Node,
    /// Payload pointer (i.e. past the block's header), valid once this node is linked into
    /// either list.
    block: NonNull<u8>,
}

unsafe fn pop(head: &mut *mut Node) -> Option<*mut Node> {
    if head.is_null() {
        return None;
    }
    let node = *head;
    // SAFETY: `node` was pushed by `push` below, which always writes a valid `next`.
    unsafe {
        *head = (*node).next;
    }
    Some(node)
}

unsafe fn push(head: &mut *mut Node, node: *mut Node) {
    // SAFETY: `node` points at storage obtained from the heap and is not aliased elsewhere.
    unsafe {
        (*node).next = *head;
    }
    *head = node;
}

struct Pool {
    block_size: usize,
    free: *mut Node,
    used: *mut Node,
    /// Registry link. The registry is a singly-linked list ordered ascending by
    /// `block_size`, scanned linearly -- acceptable given the handful of distinct block
    /// sizes a real target configures.
    next: *mut Pool,
}

/// A registry of fixed-block-size pools, each dynamically growable from a [`Heap`].
///
/// `MemPool` does not own a `Heap` itself -- `create` takes one explicitly, since growing is
/// the only operation that needs it. This lets one `MemPool` registry (as used internally by
/// [`crate::list::List`]) share whichever `Heap` its owning [`crate::Toolbox`] was built
/// with, without a self-referential lifetime.
pub struct MemPool {
    registry: UnsafeCell<*mut Pool>,
}

// SAFETY: `registry`, and every `Pool`/`Node` reachable from it, are only read or written
// while holding a `critical_section::Guard`.
unsafe impl Sync for MemPool {}

impl MemPool {
    /// Creates an empty pool registry.
    pub const fn new() -> Self {
        MemPool {
            registry: UnsafeCell::new(ptr::null_mut()),
        }
    }

    /// Creates a new pool of `block_size`-byte blocks if one does not already exist in the
    /// registry, or grows the existing one, then allocates `num_blocks` fresh blocks from
    /// `heap` and pushes them onto the pool's free list.
    ///
    /// If `heap` runs out of space partway through, the blocks already created remain usable
    /// and this returns `Err(Error::Exhausted)`; the registry is left in a consistent state
    /// either way.
    pub fn create<const HEAP_SIZE: usize>(
        &self,
        heap: &Heap<HEAP_SIZE>,
        num_blocks: usize,
        block_size: usize,
    ) -> Result<(), Error> {
        let _guard = Guard::acquire();
        self.create_locked(heap, num_blocks, block_size)
    }

    /// Core of [`MemPool::create`], assuming the caller already holds the critical section.
    ///
    /// Exposed so `crate::toolbox` and `crate::list` can combine a failed [`MemPool::allocate`]
    /// and a grow-by-one retry into a single critical section, instead of acquiring a second,
    /// nested [`Guard`] per step.
    pub(crate) fn create_locked<const HEAP_SIZE: usize>(
        &self,
        heap: &Heap<HEAP_SIZE>,
        num_blocks: usize,
        block_size: usize,
    ) -> Result<(), Error> {
        crate::tbx_assert!(num_blocks > 0);
        crate::tbx_assert!(block_size > 0);
        if num_blocks == 0 || block_size == 0 {
            return Err(Error::Exhausted);
        }

        // SAFETY: we hold the critical section for the whole registry walk/insert below.
        let pool = unsafe { self.find_or_insert_pool_locked(heap, block_size) }?;

        let mut created = 0usize;
        for _ in 0..num_blocks {
            let Some(node_ptr) = heap.allocate_locked(mem::size_of::<Node>()) else {
                break;
            };
            let Some(block_ptr) =
                heap.allocate_locked(mem::size_of::<BlockHeader>() + block_size)
            else {
                break;
            };

            let node_ptr = node_ptr.as_ptr() as *mut Node;
            let header_ptr = block_ptr.as_ptr() as *mut BlockHeader;
            // SAFETY: `header_ptr` and the bytes following it, for `block_size` bytes, are
            // freshly allocated and not aliased.
            unsafe {
                (*header_ptr).size = block_size;
                let payload = block_ptr.as_ptr().add(mem::size_of::<BlockHeader>());
                ptr::write(
                    node_ptr,
                    Node {
                        next: ptr::null_mut(),
                        block: NonNull::new_unchecked(payload),
                    },
                );
                push(&mut (*pool).free, node_ptr);
            }
            created += 1;
        }

        #[cfg(feature = "log")]
        log::trace!("pool[{block_size}]: created {created}/{num_blocks} blocks");

        if created == num_blocks {
            Ok(())
        } else {
            Err(Error::Exhausted)
        }
    }

    /// Finds the pool with exactly `block_size`, or allocates and inserts a new, empty one
    /// at the position that preserves ascending order. Caller must hold the critical
    /// section.
    unsafe fn find_or_insert_pool_locked<const HEAP_SIZE: usize>(
        &self,
        heap: &Heap<HEAP_SIZE>,
        block_size: usize,
    ) -> Result<*mut Pool, Error> {
        let mut prev: *mut Pool = ptr::null_mut();
        // SAFETY: registry access is valid while the critical section is held.
        let mut cur = unsafe { *self.registry.get() };

        while !cur.is_null() {
            // SAFETY: `cur` is a live registry entry.
            let cur_size = unsafe { (*cur).block_size };
            if cur_size == block_size {
                return Ok(cur);
            }
            if cur_size > block_size {
                break;
            }
            prev = cur;
            // SAFETY: `cur` is a live registry entry.
            cur = unsafe { (*cur).next };
        }

        let new_pool = heap
            .allocate_locked(mem::size_of::<Pool>())
            .ok_or(Error::Exhausted)?
            .as_ptr() as *mut Pool;
        // SAFETY: freshly allocated, not aliased.
        unsafe {
            ptr::write(
                new_pool,
                Pool {
                    block_size,
                    free: ptr::null_mut(),
                    used: ptr::null_mut(),
                    next: cur,
                },
            );
            if prev.is_null() {
                *self.registry.get() = new_pool;
            } else {
                (*prev).next = new_pool;
            }
        }
        Ok(new_pool)
    }

    /// Allocates a block from the smallest pool whose `block_size` is at least `size`,
    /// trying successively larger pools if the best-fit candidate is empty.
    ///
    /// Returns `None` only once every pool of sufficient size is exhausted; the caller's
    /// recovery convention is to call [`MemPool::create`] with `num_blocks = 1` to grow a
    /// pool and retry.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let _guard = Guard::acquire();
        self.allocate_locked(size)
    }

    /// Core of [`MemPool::allocate`], assuming the caller already holds the critical section.
    pub(crate) fn allocate_locked(&self, size: usize) -> Option<NonNull<u8>> {
        crate::tbx_assert!(size > 0);
        if size == 0 {
            return None;
        }

        // SAFETY: registry access is valid while the critical section is held.
        unsafe {
            let mut cur = *self.registry.get();
            while !cur.is_null() {
                if (*cur).block_size >= size {
                    if let Some(node) = pop(&mut (*cur).free) {
                        let block = (*node).block;
                        push(&mut (*cur).used, node);
                        return Some(block);
                    }
                }
                cur = (*cur).next;
            }
        }

        #[cfg(feature = "log")]
        log::debug!("pool allocate({size}): no pool of sufficient size had a free block");
        None
    }

    /// Returns a block previously obtained from [`MemPool::allocate`] to its owning pool.
    ///
    /// # Safety
    ///
    /// `ptr` must be a payload pointer previously returned by `allocate` on this same
    /// `MemPool`, not yet released. Passing any other pointer reads an arbitrary memory word
    /// as a block-size header and is undefined behavior.
    pub unsafe fn release(&self, ptr: NonNull<u8>) {
        let _guard = Guard::acquire();
        // SAFETY: forwarding the caller's contract from `release`.
        unsafe { self.release_locked(ptr) }
    }

    /// Core of [`MemPool::release`], assuming the caller already holds the critical section.
    ///
    /// # Safety
    ///
    /// Same contract as [`MemPool::release`].
    pub(crate) unsafe fn release_locked(&self, ptr: NonNull<u8>) {
        // SAFETY: caller guarantees `ptr` came from `allocate`, which places a `BlockHeader`
        // immediately before the payload it returns.
        let header_ptr = unsafe { ptr.as_ptr().sub(mem::size_of::<BlockHeader>()) } as *const BlockHeader;
        let size = unsafe { (*header_ptr).size };

        // SAFETY: registry access is valid while the critical section is held.
        unsafe {
            let mut cur = *self.registry.get();
            while !cur.is_null() {
                if (*cur).block_size == size {
                    match pop(&mut (*cur).used) {
                        Some(node) => {
                            (*node).block = ptr;
                            push(&mut (*cur).free, node);
                        }
                        None => {
                            // A pool with a matching block size exists but has no spare node
                            // cell in `used`; this can only happen if `ptr` was already
                            // released, or never came from `allocate` to begin with.
                            crate::tbx_assert!(false);
                        }
                    }
                    return;
                }
                cur = (*cur).next;
            }
        }

        // No pool claims this block size at all: `ptr` is foreign or corrupted.
        crate::tbx_assert!(false);
    }
}

impl Default for MemPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_fit_allocates_from_smallest_sufficient_pool() {
        let heap: Heap<4096> = Heap::new();
        let pools = MemPool::new();
        pools.create(&heap, 10, 8).unwrap();
        pools.create(&heap, 10, 16).unwrap();
        pools.create(&heap, 10, 32).unwrap();

        let p = pools.allocate(9).expect("16-byte pool should satisfy a 9-byte request");
        unsafe { pools.release(p) };
    }

    #[test]
    fn allocation_falls_through_to_next_larger_pool_when_exhausted() {
        let heap: Heap<8192> = Heap::new();
        let pools = MemPool::new();
        pools.create(&heap, 2, 16).unwrap();
        pools.create(&heap, 2, 32).unwrap();

        let a = pools.allocate(9).unwrap();
        let b = pools.allocate(9).unwrap();
        // 16-byte pool now empty; next request must fall through to the 32-byte pool.
        let c = pools.allocate(9).unwrap();
        let d = pools.allocate(9).unwrap();
        // Both pools now empty.
        assert!(pools.allocate(9).is_none());

        unsafe {
            pools.release(a);
            pools.release(b);
            pools.release(c);
            pools.release(d);
        }
    }

    #[test]
    fn release_then_allocate_is_lifo() {
        let heap: Heap<4096> = Heap::new();
        let pools = MemPool::new();
        pools.create(&heap, 4, 16).unwrap();

        let a = pools.allocate(9).unwrap();
        let _b = pools.allocate(9).unwrap();
        unsafe { pools.release(a) };
        let c = pools.allocate(9).unwrap();
        assert_eq!(a.as_ptr(), c.as_ptr());
    }

    #[test]
    fn block_header_records_owning_pool_block_size() {
        let heap: Heap<4096> = Heap::new();
        let pools = MemPool::new();
        pools.create(&heap, 1, 32).unwrap();

        let p = pools.allocate(9).unwrap();
        let header = unsafe { &*(p.as_ptr().sub(mem::size_of::<BlockHeader>()) as *const BlockHeader) };
        assert_eq!(header.size, 32);
        unsafe { pools.release(p) };
    }

    #[test]
    fn create_extends_existing_pool_of_same_block_size() {
        let heap: Heap<4096> = Heap::new();
        let pools = MemPool::new();
        pools.create(&heap, 1, 16).unwrap();
        pools.create(&heap, 3, 16).unwrap();

        // All four blocks must be allocatable without exhaustion.
        for _ in 0..4 {
            pools.allocate(16).expect("pool should have grown to 4 blocks");
        }
        assert!(pools.allocate(16).is_none());
    }

    #[test]
    fn create_reports_exhausted_when_heap_runs_out_partway_through() {
        // Heap large enough for the pool struct and a couple of blocks, but not ten.
        let heap: Heap<256> = Heap::new();
        let pools = MemPool::new();
        let result = pools.create(&heap, 10, 32);
        assert_eq!(result, Err(Error::Exhausted));
        // Whatever blocks were created remain usable.
        assert!(pools.allocate(32).is_some());
    }
}

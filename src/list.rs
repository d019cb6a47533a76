//! Doubly-linked list of opaque item handles, built on [`crate::pool`].
//!
//! Mirrors the source project's `tbxlist.c`. A list's own bookkeeping struct and every node
//! in its chain are themselves pool blocks (see `crate::toolbox::Toolbox::pool_allocate_or_grow`),
//! so the list module adds no allocation strategy of its own -- it only adds the
//! doubly-linked chain discipline on top. The source keeps a second pooled "list of lists"
//! node per list purely so it can walk every live list at cleanup time; this crate's `List`
//! handle is itself an owning Rust value, so that bookkeeping collapses into its `Drop` impl.

use crate::critical_section::Guard;
use crate::error::Error;
use crate::toolbox::Toolbox;
use core::mem;
use core::ptr::{self, NonNull};

/// An opaque, caller-owned handle. The list stores and compares these by value; it never
/// dereferences or takes ownership of whatever a handle points to, mirroring the source
/// project's untyped `void *` item pointers.
pub type Item = *mut core::ffi::c_void;

struct ListNode {
    item: Item,
    prev: *mut ListNode,
    next: *mut ListNode,
}

struct ListObject {
    first: *mut ListNode,
    last: *mut ListNode,
    count: usize,
}

/// A doubly-linked list of [`Item`] handles, owning one pool block for its bookkeeping
/// struct and one pool block per item currently inserted.
///
/// Borrows the [`Toolbox`] it was created from; dropping a `List` clears it and releases its
/// bookkeeping block, equivalent to the source project's `TbxListDelete`.
pub struct List<'t, const HEAP_SIZE: usize> {
    toolbox: &'t Toolbox<HEAP_SIZE>,
    obj: NonNull<ListObject>,
}

// SAFETY: `obj` and every `ListNode` reachable from it are only read or written while
// holding a `critical_section::Guard`, so sharing a `&List` (or moving a `List`) across
// threads cannot race.
unsafe impl<'t, const HEAP_SIZE: usize> Sync for List<'t, HEAP_SIZE> {}
unsafe impl<'t, const HEAP_SIZE: usize> Send for List<'t, HEAP_SIZE> {}

impl<'t, const HEAP_SIZE: usize> List<'t, HEAP_SIZE> {
    const NODE_SIZE: usize = mem::size_of::<ListNode>();
    const OBJECT_SIZE: usize = mem::size_of::<ListObject>();

    pub(crate) fn create(toolbox: &'t Toolbox<HEAP_SIZE>) -> Option<List<'t, HEAP_SIZE>> {
        let obj_ptr = toolbox.pool_allocate_or_grow(Self::OBJECT_SIZE).ok()?;
        let obj_ptr = obj_ptr.as_ptr() as *mut ListObject;
        // SAFETY: freshly allocated, not aliased.
        unsafe {
            ptr::write(
                obj_ptr,
                ListObject {
                    first: ptr::null_mut(),
                    last: ptr::null_mut(),
                    count: 0,
                },
            );
        }
        Some(List {
            toolbox,
            // SAFETY: `obj_ptr` was just derived from a non-null `NonNull<u8>`.
            obj: unsafe { NonNull::new_unchecked(obj_ptr) },
        })
    }

    /// Number of items currently in the list.
    pub fn len(&self) -> usize {
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe { (*self.obj.as_ptr()).count }
    }

    /// Whether the list currently holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every item from the list, releasing each item node back to its pool. Does
    /// not touch the list's own bookkeeping block.
    pub fn clear(&self) {
        let _guard = Guard::acquire();
        // SAFETY: guard held; every node on the chain was allocated from `toolbox.pools()`.
        unsafe {
            let obj = self.obj.as_ptr();
            let mut cur = (*obj).first;
            while !cur.is_null() {
                let next = (*cur).next;
                self.toolbox
                    .pools()
                    .release_locked(NonNull::new_unchecked(cur as *mut u8));
                cur = next;
            }
            (*obj).first = ptr::null_mut();
            (*obj).last = ptr::null_mut();
            (*obj).count = 0;
        }
    }

    fn alloc_node(&self, item: Item) -> Result<*mut ListNode, Error> {
        let ptr = self.toolbox.pool_allocate_or_grow(Self::NODE_SIZE)?;
        let node_ptr = ptr.as_ptr() as *mut ListNode;
        // SAFETY: freshly allocated, not aliased.
        unsafe {
            ptr::write(
                node_ptr,
                ListNode {
                    item,
                    prev: ptr::null_mut(),
                    next: ptr::null_mut(),
                },
            );
        }
        Ok(node_ptr)
    }

    /// Caller must hold the critical section. Returns the node currently holding `item`, if
    /// any, found by a linear scan from the head.
    unsafe fn find_locked(&self, item: Item) -> Option<*mut ListNode> {
        // SAFETY: forwarded from caller.
        let mut cur = unsafe { (*self.obj.as_ptr()).first };
        while !cur.is_null() {
            // SAFETY: `cur` is a live node on this list.
            if unsafe { (*cur).item } == item {
                return Some(cur);
            }
            cur = unsafe { (*cur).next };
        }
        None
    }

    /// Inserts `item` at the head of the list.
    pub fn insert_front(&self, item: Item) -> Result<(), Error> {
        let node_ptr = self.alloc_node(item)?;
        let _guard = Guard::acquire();
        // SAFETY: guard held; `node_ptr` is freshly allocated and not yet linked anywhere.
        unsafe {
            let obj = self.obj.as_ptr();
            (*node_ptr).prev = ptr::null_mut();
            (*node_ptr).next = (*obj).first;
            match NonNull::new((*obj).first) {
                Some(old_first) => (*old_first.as_ptr()).prev = node_ptr,
                None => (*obj).last = node_ptr,
            }
            (*obj).first = node_ptr;
            (*obj).count += 1;
        }
        Ok(())
    }

    /// Inserts `item` at the tail of the list.
    pub fn insert_back(&self, item: Item) -> Result<(), Error> {
        let node_ptr = self.alloc_node(item)?;
        let _guard = Guard::acquire();
        // SAFETY: guard held; `node_ptr` is freshly allocated and not yet linked anywhere.
        unsafe {
            let obj = self.obj.as_ptr();
            (*node_ptr).next = ptr::null_mut();
            (*node_ptr).prev = (*obj).last;
            match NonNull::new((*obj).last) {
                Some(old_last) => (*old_last.as_ptr()).next = node_ptr,
                None => (*obj).first = node_ptr,
            }
            (*obj).last = node_ptr;
            (*obj).count += 1;
        }
        Ok(())
    }

    /// Inserts `item` immediately before `reference`.
    ///
    /// Returns `Err(Error::NotFound)` if `reference` is not currently in the list; the node
    /// allocated for `item` is released back to its pool in that case.
    pub fn insert_before(&self, item: Item, reference: Item) -> Result<(), Error> {
        let node_ptr = self.alloc_node(item)?;
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let obj = self.obj.as_ptr();
            let Some(r) = self.find_locked(reference) else {
                self.toolbox
                    .pools()
                    .release_locked(NonNull::new_unchecked(node_ptr as *mut u8));
                return Err(Error::NotFound);
            };
            let prev = (*r).prev;
            (*node_ptr).prev = prev;
            (*node_ptr).next = r;
            (*r).prev = node_ptr;
            match NonNull::new(prev) {
                Some(p) => (*p.as_ptr()).next = node_ptr,
                None => (*obj).first = node_ptr,
            }
            (*obj).count += 1;
        }
        Ok(())
    }

    /// Inserts `item` immediately after `reference`.
    ///
    /// Returns `Err(Error::NotFound)` if `reference` is not currently in the list; the node
    /// allocated for `item` is released back to its pool in that case.
    pub fn insert_after(&self, item: Item, reference: Item) -> Result<(), Error> {
        let node_ptr = self.alloc_node(item)?;
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let obj = self.obj.as_ptr();
            let Some(r) = self.find_locked(reference) else {
                self.toolbox
                    .pools()
                    .release_locked(NonNull::new_unchecked(node_ptr as *mut u8));
                return Err(Error::NotFound);
            };
            let next = (*r).next;
            (*node_ptr).prev = r;
            (*node_ptr).next = next;
            (*r).next = node_ptr;
            match NonNull::new(next) {
                Some(n) => (*n.as_ptr()).prev = node_ptr,
                None => (*obj).last = node_ptr,
            }
            (*obj).count += 1;
        }
        Ok(())
    }

    /// Removes `item` from the list if present, releasing its node back to its pool.
    /// Ownership of whatever `item` points to is unaffected -- it was never the list's to
    /// begin with. A no-op, without assertion, if `item` is not present.
    pub fn remove_item(&self, item: Item) {
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let obj = self.obj.as_ptr();
            let Some(node) = self.find_locked(item) else {
                return;
            };
            let prev = (*node).prev;
            let next = (*node).next;
            match NonNull::new(prev) {
                Some(p) => (*p.as_ptr()).next = next,
                None => (*obj).first = next,
            }
            match NonNull::new(next) {
                Some(n) => (*n.as_ptr()).prev = prev,
                None => (*obj).last = prev,
            }
            (*obj).count -= 1;
            self.toolbox
                .pools()
                .release_locked(NonNull::new_unchecked(node as *mut u8));
        }
    }

    /// The first item in the list, or `None` if empty.
    pub fn first(&self) -> Option<Item> {
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let f = (*self.obj.as_ptr()).first;
            if f.is_null() {
                None
            } else {
                Some((*f).item)
            }
        }
    }

    /// The last item in the list, or `None` if empty.
    pub fn last(&self) -> Option<Item> {
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let l = (*self.obj.as_ptr()).last;
            if l.is_null() {
                None
            } else {
                Some((*l).item)
            }
        }
    }

    /// The item following `item`, or `None` if `item` is absent or is the last item.
    pub fn next(&self, item: Item) -> Option<Item> {
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let node = self.find_locked(item)?;
            let n = (*node).next;
            if n.is_null() {
                None
            } else {
                Some((*n).item)
            }
        }
    }

    /// The item preceding `item`, or `None` if `item` is absent or is the first item.
    pub fn prev(&self, item: Item) -> Option<Item> {
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let node = self.find_locked(item)?;
            let p = (*node).prev;
            if p.is_null() {
                None
            } else {
                Some((*p).item)
            }
        }
    }

    /// Exchanges the item handles stored by the nodes holding `a` and `b`, leaving the chain
    /// structure itself unchanged. A no-op if either is absent; no assertion either way.
    pub fn swap(&self, a: Item, b: Item) {
        let _guard = Guard::acquire();
        // SAFETY: guard held.
        unsafe {
            let Some(na) = self.find_locked(a) else {
                return;
            };
            let Some(nb) = self.find_locked(b) else {
                return;
            };
            let tmp = (*na).item;
            (*na).item = (*nb).item;
            (*nb).item = tmp;
        }
    }

    /// Stably sorts the list in place, using `less` as a strict less-than comparator over
    /// items.
    ///
    /// Implemented as a selection sort that acquires and releases the critical section once
    /// per outer pass (one item placed into its final position per pass), rather than once
    /// for the whole sort, bounding the latency any single held section contributes.
    /// Concurrently mutating this same list (insert/remove) from another thread while a sort
    /// is in progress is not supported: the between-passes cursor is only valid as long as
    /// the chain's shape is unchanged.
    ///
    /// Stability is preserved by rotating the found minimum into the cursor's slot one node
    /// at a time (via `prev`, swapping with each predecessor in turn) rather than swapping
    /// directly with the cursor: every item strictly between the cursor and the minimum
    /// shifts one slot toward where the minimum used to be, so their relative order among
    /// themselves survives the pass. A direct two-element swap does not have this property
    /// once three or more equal-key items are involved.
    pub fn sort<F>(&self, mut less: F)
    where
        F: FnMut(Item, Item) -> bool,
    {
        let mut cursor = {
            let _guard = Guard::acquire();
            // SAFETY: guard held.
            unsafe { (*self.obj.as_ptr()).first }
        };

        while !cursor.is_null() {
            let _guard = Guard::acquire();
            // SAFETY: guard held; `cursor` is a live node (see the no-concurrent-mutation
            // note above).
            cursor = unsafe {
                let mut min_node = cursor;
                let mut min_item = (*cursor).item;
                let mut scan = (*cursor).next;
                while !scan.is_null() {
                    if less((*scan).item, min_item) {
                        min_node = scan;
                        min_item = (*scan).item;
                    }
                    scan = (*scan).next;
                }
                let mut node = min_node;
                while node != cursor {
                    let prev = (*node).prev;
                    let tmp = (*node).item;
                    (*node).item = (*prev).item;
                    (*prev).item = tmp;
                    node = prev;
                }
                (*cursor).next
            };
        }
    }
}

impl<'t, const HEAP_SIZE: usize> Drop for List<'t, HEAP_SIZE> {
    fn drop(&mut self) {
        self.clear();
        let _guard = Guard::acquire();
        // SAFETY: `self.obj` was allocated from `self.toolbox.pools()` in `create` and has
        // not been released before now.
        unsafe {
            self.toolbox
                .pools()
                .release_locked(NonNull::new_unchecked(self.obj.as_ptr() as *mut u8));
        }
    }
}

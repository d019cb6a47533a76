//! Property tests for the pool allocator's capacity and uniqueness invariants.
//!
//! `|free| + |used| == poolCapacity` at all times, and a block handed out by `allocate`
//! cannot be handed out again until it has been `release`d.

use microtbx::Toolbox;
use proptest::prelude::*;
use std::collections::HashSet;
use std::ptr::NonNull;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn allocations_never_exceed_capacity_and_addresses_never_alias(
        capacity in 1usize..16,
        allocate_ops in proptest::collection::vec(any::<bool>(), 1..64),
    ) {
        let toolbox: Toolbox<65536> = Toolbox::new();
        toolbox.pool_create(capacity, 32).unwrap();

        let mut outstanding: Vec<NonNull<u8>> = Vec::new();
        let mut ever_seen: HashSet<usize> = HashSet::new();

        for do_allocate in allocate_ops {
            if do_allocate {
                if let Some(p) = toolbox.pool_allocate(32) {
                    let addr = p.as_ptr() as usize;
                    prop_assert!(
                        !outstanding.iter().any(|o| o.as_ptr() as usize == addr),
                        "address {addr:#x} handed out while already outstanding",
                    );
                    ever_seen.insert(addr);
                    outstanding.push(p);
                }
                prop_assert!(outstanding.len() <= capacity);
            } else if let Some(p) = outstanding.pop() {
                unsafe { toolbox.pool_release(p) };
            }
        }

        // Every address this pool ever handed out must come from a fixed set of `capacity`
        // distinct block slots -- the pool never grows past its declared capacity on its own.
        prop_assert!(ever_seen.len() <= capacity);

        for p in outstanding {
            unsafe { toolbox.pool_release(p) };
        }
    }

    #[test]
    fn release_then_allocate_reuses_the_same_address(
        capacity in 1usize..8,
    ) {
        let toolbox: Toolbox<65536> = Toolbox::new();
        toolbox.pool_create(capacity, 16).unwrap();

        let mut outstanding = Vec::new();
        for _ in 0..capacity {
            outstanding.push(toolbox.pool_allocate(16).unwrap());
        }
        prop_assert!(toolbox.pool_allocate(16).is_none());

        let released = outstanding.pop().unwrap();
        let released_addr = released.as_ptr() as usize;
        unsafe { toolbox.pool_release(released) };

        let reused = toolbox.pool_allocate(16).unwrap();
        prop_assert_eq!(reused.as_ptr() as usize, released_addr);

        outstanding.push(reused);
        for p in outstanding {
            unsafe { toolbox.pool_release(p) };
        }
    }
}

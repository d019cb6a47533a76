//! Property tests for the doubly-linked list's ordering and sort invariants, checked against
//! a plain `Vec` model.

use microtbx::{Item, Toolbox};
use proptest::prelude::*;

fn item(id: usize) -> Item {
    id as *mut core::ffi::c_void
}

fn id_of(item: Item) -> usize {
    item as usize
}

fn forward_walk<const N: usize>(list: &microtbx::List<'_, N>) -> Vec<usize> {
    let mut out = Vec::new();
    let mut cur = list.first();
    while let Some(i) = cur {
        out.push(id_of(i));
        cur = list.next(i);
    }
    out
}

fn backward_walk<const N: usize>(list: &microtbx::List<'_, N>) -> Vec<usize> {
    let mut out = Vec::new();
    let mut cur = list.last();
    while let Some(i) = cur {
        out.push(id_of(i));
        cur = list.prev(i);
    }
    out.reverse();
    out
}

/// Packs a sort key and an insertion index into one pointer-sized `Item`, so a key can repeat
/// across items that are still distinguishable by identity -- needed to check sort stability.
fn keyed_item(key: usize, idx: usize) -> Item {
    ((key << 16) | idx) as *mut core::ffi::c_void
}

fn key_of(item: Item) -> usize {
    (item as usize) >> 16
}

fn idx_of(item: Item) -> usize {
    (item as usize) & 0xffff
}

fn walk_items<const N: usize>(list: &microtbx::List<'_, N>) -> Vec<Item> {
    let mut out = Vec::new();
    let mut cur = list.first();
    while let Some(i) = cur {
        out.push(i);
        cur = list.next(i);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn doubly_linked_order_matches_model_after_arbitrary_mutation(
        ops in proptest::collection::vec(0u8..3, 1..60),
        ids in proptest::collection::vec(1usize..50, 1..60),
    ) {
        let toolbox: Toolbox<65536> = Toolbox::new();
        let list = toolbox.create_list().unwrap();
        let mut model: Vec<usize> = Vec::new();

        for (op, id) in ops.iter().zip(ids.iter()) {
            match op {
                0 => {
                    list.insert_front(item(*id)).unwrap();
                    model.insert(0, *id);
                }
                1 => {
                    list.insert_back(item(*id)).unwrap();
                    model.push(*id);
                }
                _ => {
                    list.remove_item(item(*id));
                    if let Some(pos) = model.iter().position(|x| x == id) {
                        model.remove(pos);
                    }
                }
            }

            prop_assert_eq!(list.len(), model.len());
            prop_assert_eq!(forward_walk(&list), model.clone());
            prop_assert_eq!(backward_walk(&list), model.clone());
        }
    }

    #[test]
    fn sort_produces_nondecreasing_order_and_is_a_permutation(
        ids in proptest::collection::vec(0usize..1000, 1..40),
    ) {
        let toolbox: Toolbox<65536> = Toolbox::new();
        let list = toolbox.create_list().unwrap();
        for id in &ids {
            list.insert_back(item(*id)).unwrap();
        }

        list.sort(|a, b| id_of(a) < id_of(b));

        let sorted = forward_walk(&list);
        for pair in sorted.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }

        let mut expected = ids.clone();
        expected.sort_unstable();
        prop_assert_eq!(sorted, expected);
    }

    #[test]
    fn sort_is_stable_for_duplicate_keys(
        keys in proptest::collection::vec(0usize..8, 1..40),
    ) {
        let toolbox: Toolbox<65536> = Toolbox::new();
        let list = toolbox.create_list().unwrap();
        for (idx, key) in keys.iter().enumerate() {
            list.insert_back(keyed_item(*key, idx)).unwrap();
        }

        list.sort(|a, b| key_of(a) < key_of(b));

        let sorted = walk_items(&list);
        for pair in sorted.windows(2) {
            prop_assert!(key_of(pair[0]) <= key_of(pair[1]));
        }

        // A stable sort only ever reorders items across distinct keys; within one key
        // bucket the original insertion order (tracked by `idx`) must survive unchanged.
        let mut expected: Vec<(usize, usize)> =
            keys.iter().enumerate().map(|(idx, key)| (*key, idx)).collect();
        expected.sort_by_key(|&(key, _)| key);
        let actual: Vec<(usize, usize)> =
            sorted.iter().map(|&i| (key_of(i), idx_of(i))).collect();
        prop_assert_eq!(actual, expected);
    }
}

use crate::pool::NodePool;
use crate::*;

use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16),
    Remove(u16, Side),
    Get(u16),
    PopFirst,
    PopLast,
    Clone,
    Clear,
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Left), Just(Side::Right)]
}

fn ops_strategy(keys: u16) -> impl Strategy<Value = Vec<Op>> {
    let key = 0..keys;
    let op = prop_oneof![
        50 => key.clone().prop_map(Op::Insert),
        25 => (key.clone(), side_strategy()).prop_map(|(k, s)| Op::Remove(k, s)),
        15 => key.prop_map(Op::Get),
        4 => Just(Op::PopFirst),
        4 => Just(Op::PopLast),
        1 => Just(Op::Clone),
        1 => Just(Op::Clear),
    ];
    prop::collection::vec(op, 0..=1000)
}

fn same<C: Compare<u16>>(t: &set::Set<u16, C, Pool<u16>>, m: &BTreeSet<u16>) {
    t.check();
    assert_eq!(t.len(), m.len());
    assert!(t.iter().eq(m.iter()));
    assert!(t.iter().rev().eq(m.iter().rev()));
    assert_eq!(t.first(), m.first());
    assert_eq!(t.last(), m.last());
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 20_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy(300)) {
        let mut t: Set<u16> = Set::new();
        let mut m: BTreeSet<u16> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Insert(k) => prop_assert_eq!(t.insert(k), m.insert(k)),
                Op::Remove(k, side) => {
                    prop_assert_eq!(t.take_promoting(&k, side), m.take(&k));
                }
                Op::Get(k) => prop_assert_eq!(t.get(&k), m.get(&k)),
                Op::PopFirst => prop_assert_eq!(t.pop_first(), m.pop_first()),
                Op::PopLast => prop_assert_eq!(t.pop_last(), m.pop_last()),
                Op::Clone => {
                    let c = t.clone();
                    prop_assert_eq!(c.preorder(), t.preorder());
                    t = c;
                }
                Op::Clear => {
                    t.clear();
                    m.clear();
                }
            }
        }
        same(&t, &m);
    }

    #[test]
    fn prop_no_growth_at_steady_size(keys in prop::collection::vec(0..1000u16, 1..300)) {
        let mut t: Set<u16> = Set::new();
        for &k in &keys {
            t.insert(k);
        }
        let blocks = t.store().block_count();
        for &k in &keys {
            t.remove(&k);
            t.insert(k);
        }
        prop_assert_eq!(t.store().block_count(), blocks);
        t.check();
    }

    #[test]
    fn prop_small_slabs(ops in ops_strategy(50)) {
        let mut t = set::Set::<u16, Natural, NodePool<u16, u16, 2>>::new();
        let mut m: BTreeSet<u16> = BTreeSet::new();
        for op in ops {
            match op {
                Op::Insert(k) => prop_assert_eq!(t.insert(k), m.insert(k)),
                Op::Remove(k, side) => {
                    prop_assert_eq!(t.take_promoting(&k, side), m.take(&k));
                }
                _ => {}
            }
        }
        t.check();
        prop_assert!(t.iter().eq(m.iter()));
        // Slots are recycled, so capacity follows the peak size (50 keys and the head).
        prop_assert!(t.store().capacity() <= 52);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<u16> = vec![4, 2, 6, 1, 3, 5, 7];

    for_each_permutation(&keys, |perm| {
        let mut t: Set<u16> = Set::new();
        let mut m: BTreeSet<u16> = BTreeSet::new();
        for k in perm {
            assert_eq!(t.insert(k), m.insert(k));
        }
        same(&t, &m);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<u16> = vec![4, 2, 6, 1, 3, 5, 7];

    for side in [Side::Left, Side::Right] {
        // Insert in a fixed order, then remove in all permutations.
        let base: Set<u16> = keys.iter().copied().collect();
        let base_m: BTreeSet<u16> = keys.iter().copied().collect();

        for_each_permutation(&keys, |perm| {
            let mut t = base.clone();
            let mut m = base_m.clone();
            for k in perm {
                assert_eq!(t.take_promoting(&k, side), m.take(&k));
                same(&t, &m);
            }
            assert!(t.is_empty());
        });
    }
}

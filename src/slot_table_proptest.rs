#![cfg(test)]

// Property tests for SlotTable kept inside the crate so they can reach the
// structural layer directly.

use crate::error::MapError;
use crate::slot_table::{SlotRef, SlotTable};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys
// and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    InsertIfAbsent(u8, u16),
    InsertOrReplace(u8, u16),
    Replace(u8, u16),
    Remove(u8),
    Find(u8),
    Walk,
    WalkFrom(u8),
}

fn key(i: u8) -> [u8; 2] {
    [i, i.wrapping_mul(31)]
}

fn arb_scenario() -> impl Strategy<Value = (usize, Vec<Op>)> {
    let idx = 0u8..12;
    let op = prop_oneof![
        (idx.clone(), any::<u16>()).prop_map(|(i, v)| Op::InsertIfAbsent(i, v)),
        (idx.clone(), any::<u16>()).prop_map(|(i, v)| Op::InsertOrReplace(i, v)),
        (idx.clone(), any::<u16>()).prop_map(|(i, v)| Op::Replace(i, v)),
        idx.clone().prop_map(Op::Remove),
        idx.clone().prop_map(Op::Find),
        Just(Op::Walk),
        idx.prop_map(Op::WalkFrom),
    ];
    (1usize..=8, proptest::collection::vec(op, 1..80))
}

fn full_walk<S: BuildHasher>(t: &SlotTable<S>) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor: Option<Box<[u8]>> = None;
    while let Some(next) = t.first_key_after(cursor.as_deref()) {
        out.push(next.to_vec());
        cursor = Some(next);
    }
    out
}

// Property: State-machine equivalence against std::collections::HashMap with a
// capacity bound. Invariants exercised across random operation sequences:
// - `insert_if_absent` fails with AlreadyExists iff the key is live, else with
//   CapacityExceeded iff the model is at capacity.
// - `insert_or_replace` only fails for a new key on a full table.
// - `replace_if_present` never creates an entry.
// - `remove` hands back the model's value; the old slot ref goes stale.
// - A full walk yields each live key exactly once.
// - A walk from a dead key restarts at the first live key.
fn run_scenario<S: BuildHasher>(
    mut sut: SlotTable<S>,
    capacity: usize,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Vec<u8>, u16> = HashMap::new();
    let mut stale: Vec<SlotRef> = Vec::new();

    for op in ops {
        match op {
            Op::InsertIfAbsent(i, v) => {
                let k = key(i);
                let res = sut.insert_if_absent(&k, &v.to_le_bytes());
                if model.contains_key(&k[..]) {
                    prop_assert_eq!(res, Err(MapError::AlreadyExists));
                } else if model.len() >= capacity {
                    prop_assert_eq!(res, Err(MapError::CapacityExceeded));
                } else {
                    prop_assert!(res.is_ok());
                    model.insert(k.to_vec(), v);
                }
            }
            Op::InsertOrReplace(i, v) => {
                let k = key(i);
                let res = sut.insert_or_replace(&k, &v.to_le_bytes());
                if !model.contains_key(&k[..]) && model.len() >= capacity {
                    prop_assert_eq!(res, Err(MapError::CapacityExceeded));
                } else {
                    prop_assert!(res.is_ok());
                    model.insert(k.to_vec(), v);
                }
            }
            Op::Replace(i, v) => {
                let k = key(i);
                let res = sut.replace_if_present(&k, &v.to_le_bytes());
                match model.get_mut(&k[..]) {
                    Some(mv) => {
                        prop_assert_eq!(res, Ok(()));
                        *mv = v;
                    }
                    None => prop_assert_eq!(res, Err(MapError::NotFound)),
                }
            }
            Op::Remove(i) => {
                let k = key(i);
                let before = sut.find(&k);
                match (sut.remove(&k), model.remove(&k[..])) {
                    (Ok(e), Some(mv)) => {
                        prop_assert_eq!(&*e.key, &k[..]);
                        prop_assert_eq!(&*e.value, &mv.to_le_bytes()[..]);
                        if let Some(r) = before {
                            stale.push(r);
                        }
                    }
                    (Err(MapError::NotFound), None) => {}
                    (res, mv) => prop_assert!(false, "remove mismatch: {:?} vs {:?}", res, mv),
                }
            }
            Op::Find(i) => {
                let k = key(i);
                let got = sut.slot(&k).map(|s| s.read_value().to_vec());
                let want = model.get(&k[..]).map(|v| v.to_le_bytes().to_vec());
                prop_assert_eq!(got, want);
            }
            Op::Walk => {
                let keys = full_walk(&sut);
                let unique: BTreeSet<_> = keys.iter().cloned().collect();
                prop_assert_eq!(unique.len(), keys.len(), "walk repeated a key");
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(unique, m_keys);
            }
            Op::WalkFrom(i) => {
                let k = key(i);
                let step = sut.walk_from(Some(&k));
                if model.contains_key(&k[..]) {
                    prop_assert!(!step.restarted);
                } else {
                    prop_assert!(step.restarted);
                    let first = sut.first_key_after(None);
                    prop_assert_eq!(step.key, first);
                }
            }
        }

        for &r in &stale {
            prop_assert!(sut.get(r).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert!(sut.len() <= capacity);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((capacity, ops) in arb_scenario()) {
        let mut sut = SlotTable::new(capacity);
        sut.preallocate().unwrap();
        run_scenario(sut, capacity, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((capacity, ops) in arb_scenario()) {
        run_scenario(SlotTable::with_hasher(capacity, ConstBuildHasher), capacity, ops)?;
    }
}

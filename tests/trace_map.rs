// TraceMap test suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Policies: CreateOnly never overwrites, UpdateOnly never creates,
//   CreateOrUpdate always lands the latest value.
// - Capacity: at most `capacity` live entries; replacements never count.
// - Take: lookup_and_delete returns the value once, then NotFound.
// - Walks: slot order, and restart from the first key when the cursor key
//   was deleted.
use probe_map::{counter, Field, MapConfig, MapError, TraceMap, UpdatePolicy};

fn k(n: i32) -> [u8; 4] {
    n.to_le_bytes()
}

fn map(capacity: usize) -> TraceMap {
    TraceMap::new(MapConfig::new(capacity, 4, 4)).expect("valid config")
}

fn get(m: &TraceMap, n: i32) -> Option<i32> {
    m.lookup(&k(n))
        .expect("sizes match")
        .map(|v| i32::from_le_bytes([v[0], v[1], v[2], v[3]]))
}

// Test: create-only on an existing key.
// Assumes: the first CreateOnly for a key inserts it.
// Verifies: every later CreateOnly fails with AlreadyExists and leaves the
// first value in place.
#[test]
fn create_only_succeeds_once() {
    let m = map(8);
    assert_eq!(m.update(&k(1), &k(1234), UpdatePolicy::CreateOnly), Ok(()));
    for v in [5678, 0, -1] {
        assert_eq!(
            m.update(&k(1), &k(v), UpdatePolicy::CreateOnly),
            Err(MapError::AlreadyExists)
        );
    }
    assert_eq!(get(&m, 1), Some(1234));
    assert_eq!(m.len(), 1);
}

// Test: update-only on a missing key.
// Verifies: NotFound and no entry created.
#[test]
fn update_only_requires_existing_key() {
    let m = map(8);
    assert_eq!(
        m.update(&k(1234), &k(5678), UpdatePolicy::UpdateOnly),
        Err(MapError::NotFound)
    );
    assert!(m.is_empty());
    assert_eq!(get(&m, 1234), None);

    m.update(&k(1234), &k(1), UpdatePolicy::CreateOnly).unwrap();
    assert_eq!(m.update(&k(1234), &k(2), UpdatePolicy::UpdateOnly), Ok(()));
    assert_eq!(get(&m, 1234), Some(2));
}

// Test: upsert idempotence.
// Verifies: applying the same CreateOrUpdate twice ends in the same state as once.
#[test]
fn create_or_update_is_idempotent() {
    let once = map(4);
    once.update(&k(7), &k(70), UpdatePolicy::CreateOrUpdate).unwrap();

    let twice = map(4);
    twice.update(&k(7), &k(70), UpdatePolicy::CreateOrUpdate).unwrap();
    twice.update(&k(7), &k(70), UpdatePolicy::CreateOrUpdate).unwrap();

    assert_eq!(get(&once, 7), get(&twice, 7));
    assert_eq!(once.len(), twice.len());
}

// Test: round trip for assorted widths.
// Verifies: put followed by get returns the exact bytes.
#[test]
fn put_then_get_round_trips() {
    let m = TraceMap::new(MapConfig::new(4, 3, 9)).unwrap();
    let key = [1u8, 2, 3];
    let value = [9u8, 8, 7, 6, 5, 4, 3, 2, 1];
    m.update(&key, &value, UpdatePolicy::CreateOrUpdate).unwrap();
    assert_eq!(m.lookup(&key).unwrap().as_deref(), Some(&value[..]));
}

// Test: capacity boundary.
// Verifies: the (capacity + 1)th distinct key fails with CapacityExceeded and
// exactly `capacity` entries remain; replacing an existing key still works.
#[test]
fn capacity_boundary() {
    let m = map(3);
    for n in 0..3 {
        m.update(&k(n), &k(n), UpdatePolicy::CreateOnly).unwrap();
    }
    assert_eq!(
        m.update(&k(3), &k(3), UpdatePolicy::CreateOnly),
        Err(MapError::CapacityExceeded)
    );
    assert_eq!(
        m.update(&k(3), &k(3), UpdatePolicy::CreateOrUpdate),
        Err(MapError::CapacityExceeded)
    );
    assert_eq!(m.len(), 3);
    assert_eq!(m.update(&k(0), &k(100), UpdatePolicy::CreateOrUpdate), Ok(()));
    assert_eq!(get(&m, 0), Some(100));

    m.delete(&k(1)).unwrap();
    assert_eq!(m.update(&k(3), &k(3), UpdatePolicy::CreateOnly), Ok(()));
}

// Test: delete semantics.
// Verifies: delete removes once, then reports NotFound.
#[test]
fn delete_then_missing() {
    let m = map(2);
    m.update(&k(1), &k(1), UpdatePolicy::CreateOnly).unwrap();
    assert_eq!(m.delete(&k(1)), Ok(()));
    assert_eq!(m.delete(&k(1)), Err(MapError::NotFound));
    assert_eq!(get(&m, 1), None);
}

// Test: take twice.
// Verifies: the first lookup_and_delete returns the prior value, the second
// reports NotFound, and the key is absent afterwards.
#[test]
fn lookup_and_delete_returns_value_once() {
    let m = map(4);
    m.update(&k(1), &k(1235), UpdatePolicy::CreateOnly).unwrap();
    let v = m.lookup_and_delete(&k(1)).unwrap();
    assert_eq!(&*v, &k(1235));
    assert_eq!(m.lookup_and_delete(&k(1)), Err(MapError::NotFound));
    assert_eq!(get(&m, 1), None);
    assert!(m.is_empty());
}

// Test: backend without lookup_and_delete.
// Verifies: Unsupported is reported and the entry is left alone.
#[test]
fn lookup_and_delete_can_be_disabled() {
    let m = TraceMap::new(MapConfig::new(4, 4, 4).with_lookup_and_delete(false)).unwrap();
    m.update(&k(1), &k(1), UpdatePolicy::CreateOnly).unwrap();
    assert_eq!(
        m.lookup_and_delete(&k(1)),
        Err(MapError::Unsupported("lookup_and_delete"))
    );
    assert_eq!(get(&m, 1), Some(1));
}

// Test: locked increments.
// Verifies: deltas accumulate, negative deltas subtract, and missing keys
// report NotFound without creating an entry.
#[test]
fn increment_locked_accumulates() {
    let m = map(2);
    assert_eq!(m.increment_locked(&k(0), 100), Err(MapError::NotFound));
    assert!(m.is_empty());
    m.update(&k(0), &k(0), UpdatePolicy::CreateOnly).unwrap();
    m.increment_locked(&k(0), 100).unwrap();
    m.increment_locked(&k(0), 100).unwrap();
    m.increment_locked(&k(0), -50).unwrap();
    assert_eq!(get(&m, 0), Some(150));
}

// Test: 8-byte counters.
// Verifies: wide values use the full width.
#[test]
fn increment_wide_counter() {
    let m = TraceMap::new(MapConfig::new(1, 4, 8)).unwrap();
    m.update(&k(0), &counter::encode(i64::from(u32::MAX), 8), UpdatePolicy::CreateOnly)
        .unwrap();
    m.increment_locked(&k(0), 1).unwrap();
    let v = m.lookup(&k(0)).unwrap().unwrap();
    assert_eq!(counter::decode(&v), 1 << 32);
}

// Test: layout violations.
// Verifies: SizeMismatch names the offending field and is the only contract
// violation kind.
#[test]
fn size_mismatch_is_contract_violation() {
    let m = map(2);
    let err = m.update(&k(1), &[0u8; 3], UpdatePolicy::CreateOnly).unwrap_err();
    assert_eq!(
        err,
        MapError::SizeMismatch {
            field: Field::Value,
            expected: 4,
            actual: 3
        }
    );
    assert!(err.is_contract_violation());
    assert!(!MapError::NotFound.is_contract_violation());
}

// Test: walk from the start.
// Assumes: a fresh table fills slots in insertion order.
// Verifies: next_key(None) is the first key, each next_key follows slot
// order, and the walk ends with None.
#[test]
fn next_key_walks_in_table_order() {
    let m = map(8);
    for n in 1..=4 {
        m.update(&k(n), &k(1234 + n), UpdatePolicy::CreateOnly).unwrap();
    }
    let mut cursor: Option<Box<[u8]>> = None;
    let mut seen = Vec::new();
    while let Some(next) = m.next_key(cursor.as_deref()).unwrap() {
        seen.push(i32::from_le_bytes([next[0], next[1], next[2], next[3]]));
        cursor = Some(next);
    }
    assert_eq!(seen, vec![1, 2, 3, 4]);
}

// Test: deletion during iteration.
// Assumes: keys 1..=4 inserted in order.
// Verifies: after yielding 1 and deleting 2, a walk from 1 continues to 3,
// while a walk from the stale cursor 2 restarts at 1.
#[test]
fn stale_cursor_restarts_from_first_key() {
    let m = map(8);
    for n in 1..=4 {
        m.update(&k(n), &k(n), UpdatePolicy::CreateOnly).unwrap();
    }
    let first = m.next_key(None).unwrap().unwrap();
    assert_eq!(&*first, &k(1));
    m.delete(&k(2)).unwrap();

    assert_eq!(m.next_key(Some(&k(1))).unwrap().as_deref(), Some(&k(3)[..]));
    assert_eq!(m.next_key(Some(&k(2))).unwrap().as_deref(), Some(&k(1)[..]));
    assert_eq!(m.stats().restarts, 1);
}

// Test: a cursor that never existed.
// Verifies: behaves like a restart (the lesson starts its walk from key -1).
#[test]
fn unknown_cursor_starts_walk() {
    let m = map(4);
    m.update(&k(5), &k(5), UpdatePolicy::CreateOnly).unwrap();
    assert_eq!(m.next_key(Some(&k(-1))).unwrap().as_deref(), Some(&k(5)[..]));
    assert_eq!(m.next_key(Some(&k(5))).unwrap(), None);
}

// Test: the map without preallocation behaves identically.
#[test]
fn no_prealloc_map_behaves_the_same() {
    let m = TraceMap::new(MapConfig::new(2, 4, 4).with_preallocate(false)).unwrap();
    m.update(&k(1), &k(1), UpdatePolicy::CreateOnly).unwrap();
    m.update(&k(2), &k(2), UpdatePolicy::CreateOnly).unwrap();
    assert_eq!(
        m.update(&k(3), &k(3), UpdatePolicy::CreateOnly),
        Err(MapError::CapacityExceeded)
    );
    assert_eq!(m.keys().count(), 2);
}

//! SlotTable: fixed-capacity structural layer mapping key bytes to locked values.
//!
//! Entries live in a `SlotMap`; a `HashTable` of slot handles indexes them by
//! key. Table order, used by `first_key_after`, is slot order. It is stable
//! across calls as long as no entry is inserted or removed. A dense vector
//! indexed by slot position mirrors the live handles, so a walk step resumes
//! right after its cursor instead of rescanning from the first slot.
//!
//! The table itself is not synchronized. `TraceMap` wraps it in a
//! reader/writer lock: structural changes (`insert_*`, `remove`) need
//! `&mut self`, while value writes go through each entry's `LockedCell` and
//! only need `&self`.

use crate::error::{ConfigError, MapError};
use crate::locked_cell::LockedCell;
use core::hash::BuildHasher;
use hashbrown::HashTable;
use slotmap::{DefaultKey, Key, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable reference to a live slot. Goes stale once the entry is removed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlotRef(DefaultKey);

impl SlotRef {
    pub(crate) fn new(k: DefaultKey) -> Self {
        SlotRef(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }
}

/// A live slot: immutable key bytes plus the value behind its lock.
#[derive(Debug)]
pub struct Slot {
    key: Box<[u8]>,
    value: LockedCell<Box<[u8]>>,
    hash: u64,
}

impl Slot {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &LockedCell<Box<[u8]>> {
        &self.value
    }

    /// Copy the value out under its lock, so the copy is never torn.
    pub fn read_value(&self) -> Box<[u8]> {
        self.value.with_lock(|v| v.clone())
    }

    fn write_value(&self, value: &[u8]) {
        self.value.with_lock(|v| v.copy_from_slice(value));
    }
}

/// An entry removed from the table, handed back by value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Entry {
    pub key: Box<[u8]>,
    pub value: Box<[u8]>,
}

/// One step of a table walk.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Step {
    /// The next live key, or `None` at the end of the table.
    pub key: Option<Box<[u8]>>,
    /// The cursor named a key that is no longer live, so the walk began
    /// again at the first slot.
    pub restarted: bool,
}

pub struct SlotTable<S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Slot>,
    // order[position(k)] == Some(k) for every live handle k.
    order: Vec<Option<DefaultKey>>,
    capacity: usize,
}

// Physical slot index of a handle: the low half of its ffi encoding.
fn position(k: DefaultKey) -> usize {
    (k.data().as_ffi() & 0xffff_ffff) as usize
}

impl SlotTable {
    /// Empty table holding at most `capacity` entries. Storage grows on
    /// demand; call `preallocate` to reserve it all up front.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, RandomState::new())
    }
}

impl<S> SlotTable<S>
where
    S: BuildHasher,
{
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            order: Vec::new(),
            capacity,
        }
    }

    /// Reserve storage for `capacity` entries. Fails instead of aborting
    /// when the allocation is impossible.
    pub fn preallocate(&mut self) -> Result<(), ConfigError> {
        let capacity = self.capacity;
        let failed = || ConfigError::Reserve { capacity };
        let slots = &self.slots;
        self.index
            .try_reserve(capacity, |&k| slots.get(k).map_or(0, |s| s.hash))
            .map_err(|_| failed())?;
        self.slots.try_reserve(capacity).map_err(|_| failed())?;
        // Position 0 is the slotmap sentinel and never holds an entry.
        self.order
            .try_reserve(capacity.saturating_add(1))
            .map_err(|_| failed())?;
        Ok(())
    }

    fn make_hash(&self, key: &[u8]) -> u64 {
        self.hasher.hash_one(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn find(&self, key: &[u8]) -> Option<SlotRef> {
        let hash = self.make_hash(key);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|s| &*s.key == key)
                    .unwrap_or(false)
            })
            .map(|&k| SlotRef::new(k))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Resolve a slot reference; `None` once the entry was removed.
    pub fn get(&self, slot: SlotRef) -> Option<&Slot> {
        self.slots.get(slot.raw_handle())
    }

    /// Look up the live slot for `key`.
    pub fn slot(&self, key: &[u8]) -> Option<&Slot> {
        self.find(key).and_then(|s| self.get(s))
    }

    pub fn insert_if_absent(&mut self, key: &[u8], value: &[u8]) -> Result<SlotRef, MapError> {
        if self.contains_key(key) {
            return Err(MapError::AlreadyExists);
        }
        self.insert_new(key, value)
    }

    /// Upsert. A replacement never fails; only a new key can hit capacity.
    pub fn insert_or_replace(&mut self, key: &[u8], value: &[u8]) -> Result<SlotRef, MapError> {
        if let Some(existing) = self.find(key) {
            if let Some(slot) = self.get(existing) {
                slot.write_value(value);
            }
            return Ok(existing);
        }
        self.insert_new(key, value)
    }

    /// Overwrite the value of an existing key under its lock.
    pub fn replace_if_present(&self, key: &[u8], value: &[u8]) -> Result<(), MapError> {
        let slot = self.slot(key).ok_or(MapError::NotFound)?;
        slot.write_value(value);
        Ok(())
    }

    fn insert_new(&mut self, key: &[u8], value: &[u8]) -> Result<SlotRef, MapError> {
        if self.is_full() {
            return Err(MapError::CapacityExceeded);
        }
        let hash = self.make_hash(key);
        let slot = Slot {
            key: key.into(),
            value: LockedCell::new(value.into()),
            hash,
        };
        let k = self.slots.insert(slot);
        let slots = &self.slots;
        self.index.insert_unique(hash, k, |&kk| {
            slots.get(kk).map(|s| s.hash).unwrap_or(0)
        });
        let pos = position(k);
        if self.order.len() <= pos {
            self.order.resize(pos + 1, None);
        }
        self.order[pos] = Some(k);
        Ok(SlotRef::new(k))
    }

    pub fn remove(&mut self, key: &[u8]) -> Result<Entry, MapError> {
        let hash = self.make_hash(key);
        let slots = &self.slots;
        // Unlink from index via occupied entry removal; the handle it held is
        // the one slot to free.
        let (k, _) = self
            .index
            .find_entry(hash, |&kk| slots.get(kk).is_some_and(|s| &*s.key == key))
            .map_err(|_| MapError::NotFound)?
            .remove();
        if let Some(o) = self.order.get_mut(position(k)) {
            *o = None;
        }
        let slot = self.slots.remove(k);
        debug_assert!(slot.is_some(), "index held a handle to a freed slot");
        let slot = slot.ok_or(MapError::NotFound)?;

        Ok(Entry {
            key: slot.key,
            value: slot.value.into_inner(),
        })
    }

    /// Next live key after `cursor` in table order. A missing cursor key
    /// restarts the walk at the first live key.
    pub fn first_key_after(&self, cursor: Option<&[u8]>) -> Option<Box<[u8]>> {
        self.walk_from(cursor).key
    }

    // First live slot at or after physical position `from`.
    fn next_live(&self, from: usize) -> Option<&Slot> {
        self.order
            .get(from..)?
            .iter()
            .flatten()
            .find_map(|&k| self.slots.get(k))
    }

    /// Same walk as `first_key_after`, also reporting whether it restarted.
    pub fn walk_from(&self, cursor: Option<&[u8]>) -> Step {
        let first = || self.next_live(0).map(|s| s.key.clone());
        let Some(cursor) = cursor else {
            return Step {
                key: first(),
                restarted: false,
            };
        };
        match self.find(cursor) {
            None => Step {
                key: first(),
                restarted: true,
            },
            Some(at) => {
                let key = self
                    .next_live(position(at.raw_handle()) + 1)
                    .map(|s| s.key.clone());
                Step {
                    key,
                    restarted: false,
                }
            }
        }
    }

    /// Live slots in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }
}

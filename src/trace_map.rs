//! TraceMap: the concurrent map engine.
//!
//! Structure is guarded by one reader/writer lock around the `SlotTable`;
//! value payloads are guarded per entry by `LockedCell`. Operations that only
//! read or rewrite values (`lookup`, `next_key`, `increment_locked`, the
//! replace path of `update`) share the read lock, so increments of different
//! keys run in parallel and increments of one key serialize on its cell.
//! Inserts and removals take the write lock.

use crate::config::MapConfig;
use crate::counter;
use crate::error::{ConfigError, Field, MapError};
use crate::iter::{Entries, KeyIter};
use crate::policy::UpdatePolicy;
use crate::reentrancy;
use crate::slot_table::{SlotTable, Step};
use crate::stats::{MapStats, StatsRecorder};
use core::fmt;
use core::hash::BuildHasher;
use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use tracing::{debug, trace};

pub struct TraceMap<S = RandomState> {
    config: MapConfig,
    table: RwLock<SlotTable<S>>,
    stats: StatsRecorder,
}

impl TraceMap {
    /// Create an empty map with the given layout.
    pub fn new(config: MapConfig) -> Result<Self, ConfigError> {
        Self::with_hasher(config, RandomState::new())
    }
}

impl<S> TraceMap<S>
where
    S: BuildHasher,
{
    pub fn with_hasher(config: MapConfig, hasher: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut table = SlotTable::with_hasher(config.capacity, hasher);
        if config.preallocate {
            table.preallocate()?;
        }
        debug!(
            capacity = config.capacity,
            key_size = config.key_size,
            value_size = config.value_size,
            preallocate = config.preallocate,
            "created map"
        );
        Ok(Self {
            config,
            table: RwLock::new(table),
            stats: StatsRecorder::default(),
        })
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn key_size(&self) -> usize {
        self.config.key_size
    }

    pub fn value_size(&self) -> usize {
        self.config.value_size
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    pub fn stats(&self) -> MapStats {
        self.stats.snapshot()
    }

    fn check(field: Field, expected: usize, bytes: &[u8]) -> Result<(), MapError> {
        if bytes.len() == expected {
            Ok(())
        } else {
            Err(MapError::SizeMismatch {
                field,
                expected,
                actual: bytes.len(),
            })
        }
    }

    fn check_key(&self, key: &[u8]) -> Result<(), MapError> {
        reentrancy::assert_free();
        Self::check(Field::Key, self.config.key_size, key)
    }

    fn check_value(&self, value: &[u8]) -> Result<(), MapError> {
        Self::check(Field::Value, self.config.value_size, value)
    }

    /// Write `value` under `key` according to `policy`.
    pub fn update(&self, key: &[u8], value: &[u8], policy: UpdatePolicy) -> Result<(), MapError> {
        self.check_key(key)?;
        self.check_value(value)?;
        let res = match (policy.allows_create(), policy.allows_replace()) {
            (false, _) => self.table.read().replace_if_present(key, value).map(|()| false),
            (true, false) => self.table.write().insert_if_absent(key, value).map(|_| true),
            (true, true) => {
                // Fast path: existing keys are rewritten under the read lock.
                if self.table.read().replace_if_present(key, value).is_ok() {
                    Ok(false)
                } else {
                    // Recheck under the write lock; another writer may have
                    // inserted the key meanwhile.
                    let mut table = self.table.write();
                    let existed = table.contains_key(key);
                    table.insert_or_replace(key, value).map(|_| !existed)
                }
            }
        };
        match res {
            Ok(true) => {
                self.stats.insert();
                debug!(policy = %policy, "inserted entry");
                Ok(())
            }
            Ok(false) => {
                self.stats.replace();
                Ok(())
            }
            Err(e) => {
                self.stats.reject();
                trace!(policy = %policy, error = %e, "update rejected");
                Err(e)
            }
        }
    }

    /// Copy of the value stored under `key`, read under the entry's lock.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Box<[u8]>>, MapError> {
        self.check_key(key)?;
        let value = self.table.read().slot(key).map(|slot| slot.read_value());
        self.stats.lookup(value.is_some());
        Ok(value)
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool, MapError> {
        self.check_key(key)?;
        Ok(self.table.read().contains_key(key))
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), MapError> {
        self.check_key(key)?;
        self.table.write().remove(key)?;
        self.stats.delete();
        debug!("deleted entry");
        Ok(())
    }

    /// Next key after `after` in table order, or the first key for `None`.
    ///
    /// If `after` names a key that is no longer live the walk restarts and
    /// the first key of the table is returned. `None` means the walk is over.
    pub fn next_key(&self, after: Option<&[u8]>) -> Result<Option<Box<[u8]>>, MapError> {
        match after {
            Some(key) => self.check_key(key)?,
            None => reentrancy::assert_free(),
        }
        Ok(self.step(after).key)
    }

    /// One walk step without size checks; cursors handed out by the map
    /// always have the right width.
    pub(crate) fn step(&self, after: Option<&[u8]>) -> Step {
        let step = self.table.read().walk_from(after);
        if step.restarted {
            self.stats.restart();
            trace!("cursor key no longer live; restarting walk");
        }
        step
    }

    /// Remove `key` and return its value in one step.
    ///
    /// The table write lock excludes every holder of the entry's cell, so no
    /// locked update can interleave between the read and the removal.
    pub fn lookup_and_delete(&self, key: &[u8]) -> Result<Box<[u8]>, MapError> {
        self.check_key(key)?;
        if !self.config.lookup_and_delete {
            return Err(MapError::Unsupported("lookup_and_delete"));
        }
        let entry = self.table.write().remove(key)?;
        self.stats.delete();
        debug!("took entry");
        Ok(entry.value)
    }

    /// Run `op` on the value bytes of `key` while holding the entry's lock.
    ///
    /// `op` must not call back into this or any other map; debug builds
    /// panic if it does.
    pub fn with_value_locked<R>(
        &self,
        key: &[u8],
        op: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, MapError> {
        self.check_key(key)?;
        let table = self.table.read();
        let slot = table.slot(key).ok_or(MapError::NotFound)?;
        Ok(slot.value().with_lock(|v| op(&mut v[..])))
    }

    /// Add `delta` to the counter stored under `key`.
    pub fn increment_locked(&self, key: &[u8], delta: i64) -> Result<(), MapError> {
        self.with_value_locked(key, |v| counter::add_signed(v, delta))?;
        self.stats.increment();
        Ok(())
    }

    /// Lazy walk over the live keys. See `KeyIter` for restart behavior.
    pub fn keys(&self) -> KeyIter<'_, S> {
        KeyIter::new(self)
    }

    /// Lazy walk yielding `(key, value)` pairs.
    pub fn entries(&self) -> Entries<'_, S> {
        Entries::new(self.keys())
    }
}

impl<S> fmt::Debug for TraceMap<S>
where
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceMap")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

//! Operation counters for a `TraceMap`.
//!
//! Counters are relaxed atomics bumped on the hot path; `snapshot` copies
//! them into a plain `MapStats` value. A snapshot taken while operations are
//! in flight is not a consistent cut across counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// Cache-line aligned so updaters of different counters do not false-share.
#[repr(align(64))]
#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Counter {
    #[inline]
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    lookups: Counter,
    hits: Counter,
    inserts: Counter,
    replacements: Counter,
    deletes: Counter,
    increments: Counter,
    rejected: Counter,
    restarts: Counter,
}

impl StatsRecorder {
    pub(crate) fn lookup(&self, hit: bool) {
        self.lookups.bump();
        if hit {
            self.hits.bump();
        }
    }

    pub(crate) fn insert(&self) {
        self.inserts.bump();
    }

    pub(crate) fn replace(&self) {
        self.replacements.bump();
    }

    pub(crate) fn delete(&self) {
        self.deletes.bump();
    }

    pub(crate) fn increment(&self) {
        self.increments.bump();
    }

    /// A write refused by policy or capacity.
    pub(crate) fn reject(&self) {
        self.rejected.bump();
    }

    pub(crate) fn restart(&self) {
        self.restarts.bump();
    }

    pub(crate) fn snapshot(&self) -> MapStats {
        MapStats {
            lookups: self.lookups.get(),
            hits: self.hits.get(),
            inserts: self.inserts.get(),
            replacements: self.replacements.get(),
            deletes: self.deletes.get(),
            increments: self.increments.get(),
            rejected: self.rejected.get(),
            restarts: self.restarts.get(),
        }
    }
}

/// Point-in-time copy of a map's counters.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct MapStats {
    pub lookups: u64,
    pub hits: u64,
    pub inserts: u64,
    pub replacements: u64,
    /// Entries removed by `delete` or `lookup_and_delete`.
    pub deletes: u64,
    pub increments: u64,
    pub rejected: u64,
    /// Key walks that restarted because their cursor key was deleted.
    pub restarts: u64,
}

impl MapStats {
    pub fn misses(&self) -> u64 {
        self.lookups.saturating_sub(self.hits)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

//! probe-map: a fixed-capacity, concurrent map for tracing counters, with
//! per-entry locks and the update/lookup/delete/walk semantics of kernel
//! BPF hash maps.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one map instance shared by many concurrent writers (probe events
//!   bumping counters) and readers (a consumer walking and draining keys),
//!   with no global serializing lock on the counter path.
//! - Layers:
//!   - LockedCell<T>: per-entry test-and-test-and-set spin lock. Payload
//!     access only through a RAII guard or `with_lock`.
//!   - SlotTable<S>: structural layer. Generational slots (`slotmap`) hold
//!     fixed-size key bytes and a `LockedCell` of value bytes; a
//!     `hashbrown::HashTable` of slot handles indexes them by key. Slot order
//!     is the table order used by key walks.
//!   - TraceMap<S>: public engine. A `parking_lot::RwLock` around the
//!     SlotTable, size checks, update policies, statistics and logging.
//!   - KeyIter / Entries: lazy walks driven by `next_key`.
//!   - EventIngest: create-then-lock-then-increment for probe events.
//!
//! Constraints
//! - Fixed layout: key and value widths and the capacity never change after
//!   construction. Passing the wrong width is a contract violation reported
//!   as `MapError::SizeMismatch`, before any lock is taken.
//! - Bounded: at most `capacity` live entries; a new key on a full map fails
//!   with `CapacityExceeded`, replacements always succeed.
//! - Per-key contention: `increment_locked` and value rewrites share the
//!   table read lock and serialize only on the entry's cell. Inserts and
//!   removals take the table write lock.
//! - No nesting: nothing takes a second lock while holding a cell. Debug
//!   builds enforce this with a thread-local guard (`reentrancy`).
//!
//! Walk semantics
//! - `next_key(None)` is the first live key in slot order.
//! - `next_key(Some(k))` is the first live key after `k`'s slot.
//! - If `k` is no longer live the walk restarts at the first live key. This
//!   is the observable behavior of `bpf_map_get_next_key` when a key is
//!   deleted mid-walk, kept deliberately: a walk never reads freed memory
//!   and never skips silently, but it may revisit keys.
//!
//! Notes and non-goals
//! - No kernel attachment, verifier, or byte-exact kernel storage. Probe
//!   sources are anything that yields `ProbeEvent`s.
//! - `lookup_and_delete` can be switched off per map to behave like older
//!   backends, which reject it with `Unsupported`.
//! - Counter values are little-endian two's-complement integers of the
//!   map's value width; increments wrap at that width.

pub mod command;
pub mod config;
pub mod counter;
pub mod error;
pub mod ingest;
pub mod iter;
pub mod locked_cell;
pub mod policy;
mod reentrancy;
pub mod slot_table;
mod slot_table_proptest;
pub mod stats;
pub mod trace_map;

// Public surface
pub use config::{MapConfig, MAX_CAPACITY};
pub use error::{ConfigError, Field, MapError};
pub use ingest::{Applied, EventIngest, IngestReport, ProbeEvent};
pub use iter::{Entries, KeyIter};
pub use locked_cell::{LockedCell, LockedCellGuard};
pub use policy::UpdatePolicy;
pub use reentrancy::is_held as cell_lock_held;
pub use stats::MapStats;
pub use trace_map::TraceMap;

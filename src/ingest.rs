//! Event ingest: applies probe events to a shared `TraceMap`.
//!
//! Each event names a counter key and a delta. The adapter makes sure the
//! counter exists (create-only with a zeroed value, tolerating a racing
//! creator) and then adds the delta under the entry's lock. This is the
//! create, lock, increment sequence a kernel-side probe performs on every hit.

use crate::error::MapError;
use crate::policy::UpdatePolicy;
use crate::trace_map::TraceMap;
use core::hash::BuildHasher;
use serde::Serialize;
use std::collections::hash_map::RandomState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A raw event from a probe source.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProbeEvent {
    pub key: Box<[u8]>,
    pub delta: i64,
}

impl ProbeEvent {
    pub fn new(key: impl Into<Box<[u8]>>, delta: i64) -> Self {
        Self {
            key: key.into(),
            delta,
        }
    }
}

/// What happened to a single event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Applied {
    /// The counter was created by this event, then incremented.
    Created,
    /// The counter already existed and was incremented.
    Updated,
    /// The event could not be stored (map full, or its counter kept
    /// disappearing before the increment landed).
    Dropped,
}

/// Totals for one `run`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IngestReport {
    /// Events whose delta was added to a counter.
    pub applied: u64,
    /// Of `applied`, events that also created their counter.
    pub created: u64,
    pub dropped: u64,
}

impl IngestReport {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Created => {
                self.applied += 1;
                self.created += 1;
            }
            Applied::Updated => self.applied += 1,
            Applied::Dropped => self.dropped += 1,
        }
    }
}

// A concurrent delete can land between create and increment.
const MAX_ATTEMPTS: usize = 3;

pub struct EventIngest<S = RandomState> {
    map: Arc<TraceMap<S>>,
    zero: Box<[u8]>,
}

impl<S> EventIngest<S>
where
    S: BuildHasher,
{
    pub fn new(map: Arc<TraceMap<S>>) -> Self {
        let zero = vec![0u8; map.value_size()].into_boxed_slice();
        Self { map, zero }
    }

    pub fn map(&self) -> &Arc<TraceMap<S>> {
        &self.map
    }

    /// Apply one event. Only contract violations (wrong key width) are errors.
    pub fn ingest(&self, event: &ProbeEvent) -> Result<Applied, MapError> {
        for _ in 0..MAX_ATTEMPTS {
            let created = match self.map.update(&event.key, &self.zero, UpdatePolicy::CreateOnly) {
                Ok(()) => true,
                Err(MapError::AlreadyExists) => false,
                Err(MapError::CapacityExceeded) => {
                    warn!(delta = event.delta, "map full; dropping probe event");
                    return Ok(Applied::Dropped);
                }
                Err(e) => return Err(e),
            };
            match self.map.increment_locked(&event.key, event.delta) {
                Ok(()) if created => return Ok(Applied::Created),
                Ok(()) => return Ok(Applied::Updated),
                Err(MapError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        warn!(delta = event.delta, "counter deleted during ingest; dropping probe event");
        Ok(Applied::Dropped)
    }

    /// Consume `events` until the source is exhausted.
    pub fn run<I>(&self, events: I) -> Result<IngestReport, MapError>
    where
        I: IntoIterator<Item = ProbeEvent>,
    {
        self.run_until(events, &AtomicBool::new(false))
    }

    /// Consume `events` until the source is exhausted or `stop` is raised.
    /// The flag is checked before each event is pulled, so a source that
    /// blocks is only abandoned once it yields again. Entries already stored
    /// are unaffected by stopping.
    pub fn run_until<I>(&self, events: I, stop: &AtomicBool) -> Result<IngestReport, MapError>
    where
        I: IntoIterator<Item = ProbeEvent>,
    {
        let mut report = IngestReport::default();
        let mut events = events.into_iter();
        while !stop.load(Ordering::Acquire) {
            let Some(event) = events.next() else {
                break;
            };
            report.record(self.ingest(&event)?);
        }
        debug!(
            applied = report.applied,
            created = report.created,
            dropped = report.dropped,
            "ingest finished"
        );
        Ok(report)
    }
}

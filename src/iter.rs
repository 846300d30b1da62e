//! Restart-tolerant key walks over a `TraceMap`.
//!
//! A walk keeps its cursor (the last key it yielded) and asks the map for the
//! key after it on every step. No table lock is held between steps, so the
//! map stays fully usable while a walk is in progress. If the cursor key is
//! deleted between two steps, the next step starts over from the first key
//! of the table: keys may then be yielded again, but never torn or skipped
//! silently.

use crate::trace_map::TraceMap;
use core::hash::BuildHasher;

/// Lazy sequence of keys. Ends when the map reports no further key.
pub struct KeyIter<'m, S> {
    map: &'m TraceMap<S>,
    cursor: Option<Box<[u8]>>,
    restarts: usize,
    restart_limit: Option<usize>,
    done: bool,
}

impl<'m, S> KeyIter<'m, S>
where
    S: BuildHasher,
{
    pub(crate) fn new(map: &'m TraceMap<S>) -> Self {
        Self {
            map,
            cursor: None,
            restarts: 0,
            restart_limit: None,
            done: false,
        }
    }

    /// End the walk once it has restarted more than `limit` times. A walk
    /// raced by a deleter that never stops is finite under a limit.
    pub fn restart_limit(mut self, limit: usize) -> Self {
        self.restart_limit = Some(limit);
        self
    }

    /// Number of times this walk started over.
    pub fn restarts(&self) -> usize {
        self.restarts
    }
}

impl<S> Iterator for KeyIter<'_, S>
where
    S: BuildHasher,
{
    type Item = Box<[u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = self.map.step(self.cursor.as_deref());
        if step.restarted {
            self.restarts += 1;
            if self.restart_limit.is_some_and(|limit| self.restarts > limit) {
                self.done = true;
                return None;
            }
        }
        match step.key {
            Some(key) => {
                self.cursor = Some(key.clone());
                Some(key)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Lazy sequence of `(key, value)` pairs. A key deleted between being
/// walked and being read is skipped.
pub struct Entries<'m, S> {
    keys: KeyIter<'m, S>,
}

impl<'m, S> Entries<'m, S>
where
    S: BuildHasher,
{
    pub(crate) fn new(keys: KeyIter<'m, S>) -> Self {
        Self { keys }
    }

    pub fn restart_limit(self, limit: usize) -> Self {
        Self {
            keys: self.keys.restart_limit(limit),
        }
    }

    pub fn restarts(&self) -> usize {
        self.keys.restarts()
    }
}

impl<S> Iterator for Entries<'_, S>
where
    S: BuildHasher,
{
    type Item = (Box<[u8]>, Box<[u8]>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            if let Ok(Some(value)) = self.keys.map.lookup(&key) {
                return Some((key, value));
            }
        }
    }
}

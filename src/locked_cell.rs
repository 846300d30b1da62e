//! LockedCell: per-entry spin lock guarding a mutable payload.
//!
//! Each map entry owns one cell, so contention is per key. The lock is a
//! test-and-test-and-set flag: waiters spin on a relaxed load (the line stays
//! in cache) and only attempt the swap once the flag reads clear. Critical
//! sections are O(1) and never perform I/O or take another lock.

use crate::reentrancy::{self, HeldGuard};
use core::cell::UnsafeCell;
use core::fmt;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

pub struct LockedCell<T: ?Sized> {
    acquired: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `acquired`.
unsafe impl<T: ?Sized + Send> Send for LockedCell<T> {}
unsafe impl<T: ?Sized + Send> Sync for LockedCell<T> {}

impl<T> LockedCell<T> {
    pub const fn new(data: T) -> Self {
        Self {
            acquired: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Consume the cell and return the payload. No lock is needed: we own it.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> LockedCell<T> {
    /// Spin until the lock is acquired.
    #[inline]
    pub fn lock(&self) -> LockedCellGuard<'_, T> {
        let held = reentrancy::hold();
        loop {
            while self.acquired.load(Ordering::Relaxed) {
                spin_loop();
            }
            if !self.acquired.swap(true, Ordering::Acquire) {
                return LockedCellGuard { cell: self, _held: held };
            }
        }
    }

    /// Acquire the lock only if it is free right now.
    #[inline]
    pub fn try_lock(&self) -> Option<LockedCellGuard<'_, T>> {
        let held = reentrancy::hold();
        if self
            .acquired
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(LockedCellGuard { cell: self, _held: held })
        } else {
            None
        }
    }

    /// Run `op` with exclusive access. The lock is released on every exit
    /// path, including unwinding out of `op`.
    #[inline]
    pub fn with_lock<R>(&self, op: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        op(&mut *guard)
    }

    pub fn is_locked(&self) -> bool {
        self.acquired.load(Ordering::Relaxed)
    }
}

impl<T: Default> Default for LockedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for LockedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedCell")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// RAII guard for a `LockedCell`. Releases the lock on drop.
pub struct LockedCellGuard<'a, T: ?Sized> {
    cell: &'a LockedCell<T>,
    _held: HeldGuard,
}

impl<T: ?Sized> Deref for LockedCellGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.cell.data.get() }
    }
}

impl<T: ?Sized> DerefMut for LockedCellGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held, and `&mut self` is unique.
        unsafe { &mut *self.cell.data.get() }
    }
}

impl<T: ?Sized> Drop for LockedCellGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.cell.acquired.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn with_lock_returns_op_result_and_releases() {
        let c = LockedCell::new(5u32);
        let doubled = c.with_lock(|v| {
            *v *= 2;
            *v
        });
        assert_eq!(doubled, 10);
        assert!(!c.is_locked());
        assert_eq!(c.into_inner(), 10);
    }

    #[test]
    fn try_lock_fails_while_held_elsewhere() {
        let c = Arc::new(LockedCell::new(0u8));
        let g = c.lock();
        let c2 = Arc::clone(&c);
        let got = thread::spawn(move || c2.try_lock().is_some()).join().unwrap();
        assert!(!got);
        drop(g);
        assert!(c.try_lock().is_some());
    }

    #[test]
    fn lock_released_when_op_panics() {
        let c = LockedCell::new(1i32);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            c.with_lock(|v| {
                *v = 2;
                panic!("boom");
            })
        }));
        assert!(res.is_err());
        assert!(!c.is_locked());
        assert_eq!(*c.lock(), 2);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let c = Arc::new(LockedCell::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        c.with_lock(|v| *v += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*c.lock(), 80_000);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_cells_panic_in_debug() {
        let a = LockedCell::new(0);
        let b = LockedCell::new(0);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            a.with_lock(|_| b.with_lock(|_| ()));
        }));
        assert!(res.is_err(), "expected nested cell lock to panic in debug builds");
        assert!(!a.is_locked());
        assert!(!b.is_locked());
    }
}

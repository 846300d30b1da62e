//! Debug-only lock discipline guard.
//!
//! Tracks, per thread, whether a `LockedCell` is currently held. While one
//! is held the thread must not lock another cell or enter a map operation:
//! critical sections are O(1) and never nest. In debug builds a violation
//! panics. In release builds this compiles to a zero-cost no-op.

use core::marker::PhantomData;

#[cfg(debug_assertions)]
use core::cell::Cell;

#[cfg(debug_assertions)]
thread_local! {
    static HELD: Cell<u32> = const { Cell::new(0) };
}

/// Record that the current thread is taking a cell lock. In debug builds,
/// panics if it already holds one.
#[inline]
pub(crate) fn hold() -> HeldGuard {
    #[cfg(debug_assertions)]
    {
        HELD.with(|h| {
            let d = h.get();
            assert!(d == 0, "nested locking: a LockedCell is already held by this thread");
            h.set(d + 1);
        });
    }
    HeldGuard { _nosend: PhantomData }
}

/// Assert the current thread holds no cell lock before entering a map
/// operation that may take table or cell locks.
#[inline]
pub(crate) fn assert_free() {
    #[cfg(debug_assertions)]
    {
        HELD.with(|h| {
            assert!(
                h.get() == 0,
                "map operation entered while holding a LockedCell"
            );
        });
    }
}

/// Whether the current thread holds a cell lock. Always false in release builds.
#[inline]
pub fn is_held() -> bool {
    #[cfg(debug_assertions)]
    {
        HELD.with(|h| h.get() > 0)
    }
    #[cfg(not(debug_assertions))]
    {
        false
    }
}

/// RAII guard returned by `hold`. Tied to the thread that created it.
pub(crate) struct HeldGuard {
    _nosend: PhantomData<*mut ()>,
}

impl Drop for HeldGuard {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            HELD.with(|h| {
                let d = h.get();
                debug_assert!(d > 0);
                h.set(d - 1);
            });
        }
    }
}

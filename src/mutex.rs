//! Test-and-set mutual exclusion primitives.

use core::hint;
use core::sync::atomic::{
    AtomicBool,
    Ordering::{Acquire, Relaxed, Release},
};

use crate::backoff::Waiter;
use crate::traits::RawLock;

/// Mutual-exclusion lock that backs off adaptively while contended.
///
/// The raw building block under [`CondVar`](crate::CondVar) and
/// [`Deque`](crate::Deque). A blocked `lock` spins through a [`Waiter`],
/// so brief contention is resolved in userspace and long waits degrade to
/// kernel sleeps.
pub struct Mutex {
    locked: AtomicBool,
}

impl Mutex {
    /// New mutex, initially unlocked.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl RawLock for Mutex {
    #[inline]
    fn try_lock(&self) -> bool {
        !self.locked.swap(true, Acquire)
    }

    fn lock(&self) {
        let mut waiter = Waiter::new();
        while !self.try_lock() {
            waiter.wait();
        }
    }

    #[inline]
    fn unlock(&self) {
        debug_assert!(
            self.locked.load(Relaxed),
            "unlocking a mutex that is not held"
        );
        self.locked.store(false, Release);
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Spin-only lock with the same surface as [`Mutex`].
///
/// Never performs a kernel wait. Use only around critical sections of a few
/// dozen instructions; anything longer belongs under a [`Mutex`].
pub struct Spinlock {
    locked: AtomicBool,
}

impl Spinlock {
    /// New spinlock, initially unlocked.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl RawLock for Spinlock {
    #[inline]
    fn try_lock(&self) -> bool {
        !self.locked.swap(true, Acquire)
    }

    fn lock(&self) {
        while !self.try_lock() {
            // Test-and-test-and-set: spin on a plain load so contending
            // cores share the cacheline in read mode between attempts.
            while self.locked.load(Relaxed) {
                hint::spin_loop();
            }
        }
    }

    #[inline]
    fn unlock(&self) {
        debug_assert!(
            self.locked.load(Relaxed),
            "unlocking a spinlock that is not held"
        );
        self.locked.store(false, Release);
    }
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_reports_contention() {
        let m = Mutex::new();
        assert!(m.try_lock());
        assert!(!m.try_lock());
        m.unlock();
        assert!(m.try_lock());
        m.unlock();
    }

    #[test]
    fn spinlock_try_lock_reports_contention() {
        let s = Spinlock::new();
        assert!(s.try_lock());
        assert!(!s.try_lock());
        s.unlock();
    }
}

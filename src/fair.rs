//! FIFO mutex built on the per-waiter flag queue.

use core::cell::UnsafeCell;
use core::sync::atomic::{
    AtomicBool,
    Ordering::{Acquire, Release},
};

use crate::backoff::Waiter;
use crate::condvar::FlagQueue;
use crate::mutex::Mutex;
use crate::traits::{RawLock, ScopedGuard};

struct FairState {
    /// Holders plus queued waiters. The lock is free iff zero.
    held: usize,
    queue: FlagQueue,
}

/// Mutex that serves blocked threads in strict lock-call order.
///
/// Uses the same idiom as [`CondVar`](crate::CondVar): each blocked thread
/// spins on a flag on its own stack, and `unlock` hands ownership directly
/// to the oldest waiter. Not recursive.
pub struct FairMutex {
    gate: Mutex,
    state: UnsafeCell<FairState>,
}

// SAFETY: `state` is only accessed while `gate` is held; queued raw
// pointers target stack flags of threads that stay blocked until the flag
// is set.
unsafe impl Send for FairMutex {}
unsafe impl Sync for FairMutex {}

impl FairMutex {
    /// New mutex, initially unlocked.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            gate: Mutex::new(),
            state: UnsafeCell::new(FairState {
                held: 0,
                queue: FlagQueue::new(),
            }),
        }
    }
}

impl RawLock for FairMutex {
    fn try_lock(&self) -> bool {
        let _gate = ScopedGuard::new(&self.gate);
        // SAFETY: gate held.
        let state = unsafe { &mut *self.state.get() };
        if state.held == 0 {
            state.held = 1;
            true
        } else {
            false
        }
    }

    fn lock(&self) {
        let myturn = AtomicBool::new(false);
        let acquired = {
            let _gate = ScopedGuard::new(&self.gate);
            // SAFETY: gate held.
            let state = unsafe { &mut *self.state.get() };
            state.held += 1;
            if state.held == 1 {
                debug_assert!(
                    state.queue.is_empty(),
                    "fair mutex free with waiters still queued"
                );
                true
            } else {
                state.queue.push(&myturn);
                false
            }
        };
        if !acquired {
            let mut waiter = Waiter::new();
            while !myturn.load(Acquire) {
                waiter.wait();
            }
        }
    }

    fn unlock(&self) {
        let next = {
            let _gate = ScopedGuard::new(&self.gate);
            // SAFETY: gate held.
            let state = unsafe { &mut *self.state.get() };
            debug_assert!(state.held > 0, "unlocking a fair mutex that is not held");
            state.held -= 1;
            if state.held > 0 {
                let flag = state.queue.pop();
                debug_assert!(
                    flag.is_some(),
                    "fair mutex held count and waiter queue disagree"
                );
                flag
            } else {
                debug_assert!(
                    state.queue.is_empty(),
                    "fair mutex free with waiters still queued"
                );
                None
            }
        };
        if let Some(flag) = next {
            // SAFETY: the popped waiter is spinning on its stack flag and
            // cannot return before this store, so the pointer is live.
            unsafe { (*flag).store(true, Release) };
        }
    }
}

impl Default for FairMutex {
    fn default() -> Self {
        Self::new()
    }
}

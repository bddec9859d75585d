//! Fair, scalable signaling built on per-waiter flags.

use core::cell::UnsafeCell;
use core::sync::atomic::{
    AtomicBool,
    Ordering::{Acquire, Release},
};
use std::sync::{Condvar as StdCondvar, Mutex as StdMutex, MutexGuard};

use crate::backoff::Waiter;
use crate::error::{Error, Result};
use crate::mutex::Mutex;
use crate::traits::RawLock;

/// Most threads that may block on one [`CondVar`] or
/// [`FairMutex`](crate::FairMutex) at a time.
pub const MAX_WAITERS: usize = 64;

/// Bounded ring of pointers to per-waiter wake flags.
///
/// Each blocked thread publishes the address of an [`AtomicBool`] on its
/// own stack and then spins on that flag alone, so wakeups never bounce a
/// shared cacheline between waiters. The publishing store uses `Release`
/// and the waiter's spin loads `Acquire`.
///
/// The flag's stack frame stays live for the whole hand-off: a waiter does
/// not return until it observes its flag `true`, and the queue never
/// touches a pointer after storing through it.
pub(crate) struct FlagQueue {
    front: usize,
    back: usize,
    len: usize,
    slots: [*const AtomicBool; MAX_WAITERS],
}

impl FlagQueue {
    pub(crate) const fn new() -> Self {
        Self {
            front: 0,
            back: 0,
            len: 0,
            slots: [core::ptr::null(); MAX_WAITERS],
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a waiter's flag. Exceeding [`MAX_WAITERS`] is a caller bug
    /// and fatal.
    pub(crate) fn push(&mut self, flag: *const AtomicBool) {
        assert!(
            self.len < MAX_WAITERS,
            "{}",
            Error::QueueFull { limit: MAX_WAITERS }
        );
        self.slots[self.back] = flag;
        self.back = (self.back + 1) % MAX_WAITERS;
        self.len += 1;
    }

    /// Remove and return the oldest waiter's flag.
    pub(crate) fn pop(&mut self) -> Option<*const AtomicBool> {
        if self.len == 0 {
            return None;
        }
        let flag = self.slots[self.front];
        // Cleared so a stale pointer can never be redelivered.
        self.slots[self.front] = core::ptr::null();
        self.front = (self.front + 1) % MAX_WAITERS;
        self.len -= 1;
        Some(flag)
    }
}

struct CvState {
    /// Signals posted but not yet consumed by a wait.
    pending: usize,
    queue: FlagQueue,
}

/// Fair condition variable fused with its [`Mutex`].
///
/// The mutex face ([`RawLock`]) protects both the caller's state and the
/// internal waiter queue. Waiters wake strictly in wait order, one per
/// signal, and a signal posted while no waiter is queued is remembered and
/// consumed by the next wait, so a signal issued between a waiter's
/// enqueue and its sleep is never lost.
///
/// `wait` and `signal` are `unsafe`: both require the caller to hold the
/// lock, which is what serializes access to the waiter queue.
pub struct CondVar {
    mutex: Mutex,
    state: UnsafeCell<CvState>,
}

// SAFETY: `state` is only accessed while `mutex` is held (the documented
// contract of `wait`/`signal`); the queued raw pointers target stack flags
// of threads that stay blocked until the flag is set.
unsafe impl Send for CondVar {}
unsafe impl Sync for CondVar {}

impl CondVar {
    /// New condition variable with no pending signals and no waiters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mutex: Mutex::new(),
            state: UnsafeCell::new(CvState {
                pending: 0,
                queue: FlagQueue::new(),
            }),
        }
    }

    /// Block until signaled.
    ///
    /// Consumes exactly one signal: either one already pending (fast path,
    /// no blocking) or the one that eventually wakes this waiter. Wakeup
    /// order among blocked threads is FIFO. Before returning, passes any
    /// further eligible wakeups on to younger waiters.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock. It is held again when this returns.
    pub unsafe fn wait(&self) {
        {
            // SAFETY: lock held per this function's contract.
            let state = unsafe { &mut *self.state.get() };
            if state.pending > 0 {
                state.pending -= 1;
                Self::drain(state);
                return;
            }
        }

        let myturn = AtomicBool::new(false);
        {
            // SAFETY: lock still held; the borrow ends before we release it.
            let state = unsafe { &mut *self.state.get() };
            state.queue.push(&myturn);
        }
        self.mutex.unlock();
        let mut waiter = Waiter::new();
        while !myturn.load(Acquire) {
            waiter.wait();
        }
        self.mutex.lock();

        // SAFETY: lock re-acquired above.
        let state = unsafe { &mut *self.state.get() };
        Self::drain(state);
    }

    /// Post one signal, waking the oldest waiter if any is queued.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock.
    pub unsafe fn signal(&self) {
        // SAFETY: lock held per this function's contract.
        let state = unsafe { &mut *self.state.get() };
        state.pending += 1;
        Self::drain(state);
    }

    /// Match pending signals with queued waiters, oldest first.
    fn drain(state: &mut CvState) {
        while state.pending > 0 {
            let Some(flag) = state.queue.pop() else { break };
            state.pending -= 1;
            // SAFETY: the waiter that published `flag` is still spinning on
            // it and cannot return before this store, so the pointer is live.
            unsafe { (*flag).store(true, Release) };
        }
    }
}

impl RawLock for CondVar {
    #[inline]
    fn try_lock(&self) -> bool {
        self.mutex.try_lock()
    }

    #[inline]
    fn lock(&self) {
        self.mutex.lock();
    }

    #[inline]
    fn unlock(&self) {
        self.mutex.unlock();
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel-blocking condition variable with its own mutex.
///
/// A plain `std::sync` pair for waits that must not consume cycles and can
/// tolerate kernel-tick wake granularity. Poisoning surfaces as
/// [`Error::LockFailure`].
pub struct BlockingCondVar {
    mutex: StdMutex<()>,
    cv: StdCondvar,
}

/// Proof of holding a [`BlockingCondVar`]'s mutex.
#[must_use]
pub struct BlockingGuard<'a>(MutexGuard<'a, ()>);

impl BlockingCondVar {
    /// New pair, mutex unlocked.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mutex: StdMutex::new(()),
            cv: StdCondvar::new(),
        }
    }

    /// Acquire the mutex.
    pub fn lock(&self) -> Result<BlockingGuard<'_>> {
        self.mutex.lock().map(BlockingGuard).map_err(|_| Error::LockFailure {
            message: "condition variable mutex poisoned",
        })
    }

    /// Release the mutex and block until signaled; the mutex is held again
    /// on return. Spurious wakeups are possible, as with any kernel
    /// condition variable.
    pub fn wait<'a>(&'a self, guard: BlockingGuard<'a>) -> Result<BlockingGuard<'a>> {
        self.cv.wait(guard.0).map(BlockingGuard).map_err(|_| Error::LockFailure {
            message: "condition variable wait on poisoned mutex",
        })
    }

    /// Wake one blocked thread.
    pub fn signal(&self) {
        self.cv.notify_one();
    }

    /// Wake every blocked thread.
    pub fn broadcast(&self) {
        self.cv.notify_all();
    }
}

impl Default for BlockingCondVar {
    fn default() -> Self {
        Self::new()
    }
}

//! Multi-reader / single-writer lock with atomic upgrade.

use core::cell::UnsafeCell;

use crate::backoff::Waiter;
use crate::error::Error;
use crate::mutex::Spinlock;
use crate::traits::ScopedGuard;

/// Acquisition mode for the mode-dispatched [`RwLock`] surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Acquire nothing; `lock`/`unlock` are no-ops.
    None,
    /// Shared access alongside other readers.
    Read,
    /// Exclusive access.
    Write,
}

impl TryFrom<usize> for LockMode {
    type Error = Error;

    /// Decode a raw mode value (0 = none, 1 = read, 2 = write).
    fn try_from(raw: usize) -> Result<Self, Error> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            _ => Err(Error::InvalidArgument {
                message: format!("unknown lock mode {raw}"),
            }),
        }
    }
}

struct RwState {
    nreader: usize,
    writer: bool,
}

/// Reader–writer lock with read→write upgrade and write→read downgrade.
///
/// The reader count and writer flag are kept behind an internal
/// [`Spinlock`], so every state transition is a handful of instructions.
/// Blocking acquires retry through a [`Waiter`]. Writers get no
/// anti-starvation guarantee under continuous read load; callers that need
/// fairness serialize through a [`FairMutex`](crate::FairMutex) instead.
pub struct RwLock {
    guard: Spinlock,
    state: UnsafeCell<RwState>,
}

// SAFETY: `state` is only touched while `guard` is held, which serializes
// all access; the contained counters are plain data.
unsafe impl Send for RwLock {}
unsafe impl Sync for RwLock {}

impl RwLock {
    /// New lock with no readers and no writer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            guard: Spinlock::new(),
            state: UnsafeCell::new(RwState {
                nreader: 0,
                writer: false,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RwState) -> R) -> R {
        let _guard = ScopedGuard::new(&self.guard);
        // SAFETY: the spinlock is held, so this is the only live reference.
        let state = unsafe { &mut *self.state.get() };
        f(state)
    }

    /// Attempt shared acquisition. Fails only if a writer is present.
    pub fn try_read_lock(&self) -> bool {
        self.with_state(|s| {
            if s.writer {
                false
            } else {
                s.nreader += 1;
                true
            }
        })
    }

    /// Attempt exclusive acquisition. Fails if any reader or writer is present.
    pub fn try_write_lock(&self) -> bool {
        self.with_state(|s| {
            if s.writer || s.nreader > 0 {
                false
            } else {
                s.writer = true;
                true
            }
        })
    }

    /// Shared acquisition, blocking while a writer is present.
    pub fn read_lock(&self) {
        let mut waiter = Waiter::new();
        while !self.try_read_lock() {
            waiter.wait();
        }
    }

    /// Exclusive acquisition, blocking while any holder is present.
    pub fn write_lock(&self) {
        let mut waiter = Waiter::new();
        while !self.try_write_lock() {
            waiter.wait();
        }
    }

    /// Release a shared hold.
    pub fn read_unlock(&self) {
        self.with_state(|s| {
            debug_assert!(s.nreader > 0, "read_unlock with no readers");
            s.nreader -= 1;
        });
    }

    /// Release an exclusive hold.
    pub fn write_unlock(&self) {
        self.with_state(|s| {
            debug_assert!(s.writer, "write_unlock with no writer");
            s.writer = false;
        });
    }

    /// Attempt to turn a shared hold into the exclusive one.
    ///
    /// Succeeds iff the caller is the only reader and no writer is present.
    pub fn try_upgrade(&self) -> bool {
        self.with_state(|s| {
            if !s.writer && s.nreader == 1 {
                s.nreader = 0;
                s.writer = true;
                true
            } else {
                false
            }
        })
    }

    /// Turn a shared hold into the exclusive one, busy-waiting for other
    /// readers to leave.
    ///
    /// Deadlocks if two holders wait to upgrade at the same time; arranging
    /// at most one upgrader is the caller's responsibility.
    pub fn upgrade(&self) {
        let mut waiter = Waiter::new();
        while !self.try_upgrade() {
            waiter.wait();
        }
    }

    /// Turn the exclusive hold into a shared one. Always immediate.
    pub fn downgrade(&self) {
        self.with_state(|s| {
            debug_assert!(s.writer, "downgrade with no writer");
            s.nreader += 1;
            s.writer = false;
        });
    }

    /// Blocking acquisition in the given mode. [`LockMode::None`] is a no-op.
    pub fn lock(&self, mode: LockMode) {
        match mode {
            LockMode::None => {}
            LockMode::Read => self.read_lock(),
            LockMode::Write => self.write_lock(),
        }
    }

    /// Non-blocking acquisition in the given mode.
    ///
    /// [`LockMode::None`] trivially succeeds.
    pub fn try_lock_mode(&self, mode: LockMode) -> bool {
        match mode {
            LockMode::None => true,
            LockMode::Read => self.try_read_lock(),
            LockMode::Write => self.try_write_lock(),
        }
    }

    /// Release in the given mode. [`LockMode::None`] is a no-op.
    pub fn unlock(&self, mode: LockMode) {
        match mode {
            LockMode::None => {}
            LockMode::Read => self.read_unlock(),
            LockMode::Write => self.write_unlock(),
        }
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_share_writers_exclude() {
        let rw = RwLock::new();
        assert!(rw.try_read_lock());
        assert!(rw.try_read_lock());
        assert!(!rw.try_write_lock());
        rw.read_unlock();
        rw.read_unlock();
        assert!(rw.try_write_lock());
        assert!(!rw.try_read_lock());
        rw.write_unlock();
    }

    #[test]
    fn upgrade_requires_sole_reader() {
        let rw = RwLock::new();
        rw.read_lock();
        rw.read_lock();
        assert!(!rw.try_upgrade());
        rw.read_unlock();
        assert!(rw.try_upgrade());
        assert!(!rw.try_read_lock());
        rw.write_unlock();
    }

    #[test]
    fn downgrade_admits_readers_again() {
        let rw = RwLock::new();
        rw.write_lock();
        rw.downgrade();
        assert!(rw.try_read_lock());
        rw.read_unlock();
        rw.read_unlock();
    }

    #[test]
    fn mode_dispatch_round_trips() {
        let rw = RwLock::new();
        rw.lock(LockMode::Read);
        assert!(rw.try_lock_mode(LockMode::Read));
        rw.unlock(LockMode::Read);
        rw.unlock(LockMode::Read);
        rw.lock(LockMode::Write);
        assert!(!rw.try_lock_mode(LockMode::Read));
        rw.unlock(LockMode::Write);
        // None never touches the state.
        rw.lock(LockMode::None);
        assert!(rw.try_lock_mode(LockMode::None));
        rw.unlock(LockMode::None);
        assert!(rw.try_write_lock());
        rw.write_unlock();
    }

    #[test]
    fn raw_mode_decoding() {
        assert_eq!(LockMode::try_from(0).unwrap(), LockMode::None);
        assert_eq!(LockMode::try_from(1).unwrap(), LockMode::Read);
        assert_eq!(LockMode::try_from(2).unwrap(), LockMode::Write);
        let err = LockMode::try_from(7).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}

//! Lock seams shared by the blocking primitives.

/// Minimal raw-lock surface: manually paired lock/unlock over no data.
///
/// Unlike `std::sync::Mutex`, a [`RawLock`] protects no value and never
/// poisons; the guarded state lives outside the lock and the pairing of
/// `lock`/`unlock` is the caller's responsibility (or [`ScopedGuard`]'s).
pub trait RawLock {
    /// Attempt to acquire without blocking. Returns `true` on success.
    fn try_lock(&self) -> bool;

    /// Acquire, blocking as needed.
    fn lock(&self);

    /// Release a held lock.
    ///
    /// Releasing a lock the caller does not hold corrupts the primitive;
    /// implementations debug-check what they can.
    fn unlock(&self);
}

/// RAII acquisition of a [`RawLock`].
///
/// Locks on construction and unlocks when dropped, on every exit path
/// including unwinds.
#[must_use]
pub struct ScopedGuard<'a, L: RawLock> {
    lock: &'a L,
}

impl<'a, L: RawLock> ScopedGuard<'a, L> {
    /// Acquire `lock`, releasing it again when the guard drops.
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self { lock }
    }
}

impl<L: RawLock> Drop for ScopedGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// Attempt to acquire two locks without blocking while holding either one.
///
/// Acquires `a` first; if `b` cannot also be taken, `a` is released and the
/// whole attempt fails. On `true` the caller holds both.
pub fn try_two_locks<A: RawLock, B: RawLock>(a: &A, b: &B) -> bool {
    if !a.try_lock() {
        return false;
    }
    if b.try_lock() {
        return true;
    }
    a.unlock();
    false
}

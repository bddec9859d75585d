//! Adaptive spin-then-sleep backoff for contended acquires.

use core::hint;
use std::thread;
use std::time::Duration;

/// Calls spent in the pure-spin phase before the backoff starts sleeping.
/// At a ~1 GHz polling rate this is on the order of 10 ms of spinning.
const NSPIN: u64 = 10_000_000;
/// Calls spent napping after the spin phase, before long sleeps begin.
const NNAP: u64 = 1_000;
const NAPTIME: Duration = Duration::from_millis(1);
const SLEEPTIME: Duration = Duration::from_millis(10);

/// Adaptive backoff helper used inside spin loops.
///
/// Each call to [`wait`](Waiter::wait) delays the caller by an amount that
/// grows with consecutive calls: the first `NSPIN` calls only consume CPU
/// cycles, the next `NNAP` calls nap for 1 ms, and every call after that
/// sleeps for 10 ms. Contended-but-brief acquires stay in userspace; long
/// waits get out of the scheduler's way. Sleeping keeps wake granularity at
/// kernel-timer resolution, so callers that need low-latency wakeups must
/// succeed within the spin phase.
///
/// Create one per wait site, usually on the stack, and [`reset`](Waiter::reset)
/// it after a successful acquire if it will be reused.
pub struct Waiter {
    count: u64,
}

impl Waiter {
    /// New waiter, starting in the spin phase.
    #[must_use]
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Return to the spin phase.
    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Delay the caller, escalating with each consecutive call.
    pub fn wait(&mut self) {
        self.count = self.count.saturating_add(1);
        if self.count < NSPIN {
            // Burst of spin hints so the polling loop has a real body the
            // compiler keeps, without touching shared memory.
            for _ in 0..100 {
                hint::spin_loop();
            }
        } else if self.count < NSPIN + NNAP {
            thread::sleep(NAPTIME);
        } else {
            thread::sleep(SLEEPTIME);
        }
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

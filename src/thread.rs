//! Worker thread wrapper and CPU affinity policy.

use std::num::NonZero;
use std::sync::Mutex as StdMutex;
use std::thread::{self, JoinHandle};

use log::warn;

/// Affinity class of the main thread.
pub const AFFINITY_MAIN: usize = 0;
/// Affinity class of the communication thread.
pub const AFFINITY_COMM: usize = 1;
/// Affinity class of pool worker threads.
pub const AFFINITY_WORKER: usize = 2;

#[derive(Debug, Clone, Copy)]
struct AffinityPattern {
    bind: [bool; 3],
    cpulo: [usize; 3],
    cpuhi: [usize; 3],
}

static PATTERN: StdMutex<Option<AffinityPattern>> = StdMutex::new(None);

pub(crate) fn ncpu() -> usize {
    thread::available_parallelism().map(NonZero::get).unwrap_or(1)
}

/// Configure how the three thread classes bind to CPUs.
///
/// Process-global; applied by threads that call [`set_affinity`] afterwards.
/// For each class, `bind[class]` says whether to pin and `cpulo[class]` is
/// the lowest CPU (clamped into `[0, ncpu)`). Bound main and communication
/// threads pin to that single CPU; bound workers round-robin over
/// `[cpulo, ncpu)` by pool index. Unbound classes are left to the OS
/// scheduler.
pub fn set_affinity_pattern(bind: [bool; 3], cpulo: [usize; 3]) {
    let ncpu = ncpu();
    let mut pattern = AffinityPattern {
        bind,
        cpulo,
        cpuhi: [0; 3],
    };
    for class in 0..3 {
        pattern.cpulo[class] = pattern.cpulo[class].min(ncpu - 1);
        pattern.cpuhi[class] = if class < 2 && bind[class] {
            pattern.cpulo[class]
        } else {
            ncpu - 1
        };
    }
    *PATTERN.lock().unwrap() = Some(pattern);
}

/// Apply the configured affinity for `class` on the calling thread.
///
/// `index` is the caller's pool index, required for
/// [`AFFINITY_WORKER`]. Unknown classes warn and change nothing; so does a
/// CPU the OS refuses to pin to. Without a configured pattern, or for an
/// unbound class, the thread keeps floating.
pub fn set_affinity(class: usize, index: Option<usize>) {
    if class > AFFINITY_WORKER {
        warn!("unknown thread affinity class {class}, leaving thread unbound");
        return;
    }
    let Some(pattern) = *PATTERN.lock().unwrap() else {
        return;
    };
    if !pattern.bind[class] {
        return;
    }
    let lo = pattern.cpulo[class];
    let hi = pattern.cpuhi[class];
    let cpu = if class == AFFINITY_WORKER {
        let Some(index) = index else {
            warn!("worker affinity requested without a pool index");
            return;
        };
        lo + index % (hi - lo + 1)
    } else {
        lo
    };
    if !core_affinity::set_for_current(core_affinity::CoreId { id: cpu }) {
        warn!("could not pin thread to cpu {cpu}");
    }
}

#[cfg(test)]
pub(crate) fn clear_affinity_pattern() {
    *PATTERN.lock().unwrap() = None;
}

/// Handle to one of the pool's OS threads.
///
/// Carries the thread's pool index so the worker can bind itself with
/// [`set_affinity`] on entry.
pub struct PoolThread {
    handle: Option<JoinHandle<()>>,
    pool_index: usize,
}

impl PoolThread {
    /// Spawn a worker running `f`.
    pub fn spawn(pool_index: usize, f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            handle: Some(thread::spawn(f)),
            pool_index,
        }
    }

    /// Index of this thread within its pool.
    #[must_use]
    pub fn pool_index(&self) -> usize {
        self.pool_index
    }

    /// Wait for the thread to exit. Idempotent; a worker that panicked
    /// fatally has already been reported, so the join result is discarded.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

//! Concurrency substrate for a parallel numerical computing framework.
//!
//! Layers, from the bottom up:
//!
//! - [`Waiter`] — adaptive backoff: spin, then nap, then sleep.
//! - [`Mutex`], [`Spinlock`], [`FairMutex`], [`RwLock`] — raw locks behind
//!   the common [`RawLock`] seam, scoped via [`ScopedGuard`].
//! - [`CondVar`] — fair signaling where each blocked thread spins on a flag
//!   on its own stack; [`BlockingCondVar`] for kernel-blocking waits.
//! - [`Deque`] — growable double-ended work queue with integrated
//!   signaling and lifetime counters.
//! - [`ThreadPool`] — process singleton of workers draining the shared
//!   deque, with priority dispatch, CPU affinity and sentinel shutdown.
//! - [`Range`] — splittable interval that parallel-for constructs cut into
//!   per-task chunks.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use taskmill::{FnTask, ThreadPool};
//!
//! ThreadPool::begin(Some(2)).expect("single-threaded startup");
//! let ran = Arc::new(AtomicUsize::new(0));
//! for _ in 0..8 {
//!     let ran = Arc::clone(&ran);
//!     ThreadPool::add(Box::new(FnTask::new(move || {
//!         ran.fetch_add(1, Ordering::Relaxed);
//!     })));
//! }
//! while ran.load(Ordering::Relaxed) < 8 {
//!     ThreadPool::run_one_task();
//! }
//! ThreadPool::end();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

mod backoff;
mod condvar;
mod deque;
mod error;
mod fair;
mod mutex;
mod pool;
mod range;
mod rwlock;
mod task;
mod thread;
mod traits;


pub use backoff::Waiter;
pub use condvar::{BlockingCondVar, BlockingGuard, CondVar, MAX_WAITERS};
pub use deque::{Deque, DequeStats};
pub use error::{Error, Result};
pub use fair::FairMutex;
pub use mutex::{Mutex, Spinlock};
pub use pool::{ThreadPool, POOL_NTHREAD};
pub use range::Range;
pub use rwlock::{LockMode, RwLock};
pub use task::{FnTask, PoolTask, TaskAttributes};
pub use thread::{
    set_affinity, set_affinity_pattern, PoolThread, AFFINITY_COMM, AFFINITY_MAIN,
    AFFINITY_WORKER,
};
pub use traits::{try_two_locks, RawLock, ScopedGuard};

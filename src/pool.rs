//! Singleton worker pool dispatching tasks from a shared deque.

use core::any::Any;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use log::{debug, error};

use crate::backoff::Waiter;
use crate::deque::{Deque, DequeStats};
use crate::error::{Error, Result};
use crate::task::{PoolTask, SentinelTask};
use crate::thread::{ncpu, set_affinity, PoolThread, AFFINITY_WORKER};

/// Environment variable selecting the worker count at startup.
pub const POOL_NTHREAD: &str = "POOL_NTHREAD";

static INSTANCE: OnceLock<ThreadPool> = OnceLock::new();

/// State shared between the pool handle and its workers.
struct PoolShared {
    queue: Deque<Box<dyn PoolTask>>,
    finish: AtomicBool,
    nfinished: AtomicUsize,
}

/// Singleton pool of threads for dynamic execution of tasks.
///
/// Initialize with [`begin`](ThreadPool::begin) while the process is still
/// single-threaded, and tear down with [`end`](ThreadPool::end) the same
/// way; the pool cannot be resized or reconfigured in between. Entry
/// points other than `begin` lazily initialize a default-configured pool
/// on first use.
///
/// Submission transfers ownership: the pool runs each task once and drops
/// it. High-priority tasks dispatch at the front of the queue, ahead of
/// every queued normal task.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    threads: StdMutex<Vec<PoolThread>>,
    nthreads: usize,
}

impl ThreadPool {
    /// Initialize the singleton. Call exactly once, single-threaded.
    ///
    /// Worker count is `nthread` if given, else the [`POOL_NTHREAD`]
    /// environment variable, else `max(2, ncpu) - 1`. Fails with
    /// [`Error::InvalidConfig`] on an unparseable variable or if the pool
    /// already exists.
    pub fn begin(nthread: Option<usize>) -> Result<()> {
        if INSTANCE.get().is_some() {
            return Err(already_initialized());
        }
        let pool = Self::start(nthread)?;
        INSTANCE.set(pool).map_err(|_| already_initialized())
    }

    fn start(nthread: Option<usize>) -> Result<Self> {
        let nthreads = match nthread {
            Some(n) => n,
            None => default_nthread()?,
        };
        let shared = Arc::new(PoolShared {
            queue: Deque::new(),
            finish: AtomicBool::new(false),
            nfinished: AtomicUsize::new(0),
        });
        let mut threads = Vec::with_capacity(nthreads);
        for index in 0..nthreads {
            let shared = Arc::clone(&shared);
            threads.push(PoolThread::spawn(index, move || worker_loop(&shared, index)));
        }
        debug!("thread pool started with {nthreads} workers");
        Ok(Self {
            shared,
            threads: StdMutex::new(threads),
            nthreads,
        })
    }

    fn instance() -> &'static ThreadPool {
        INSTANCE.get_or_init(|| {
            Self::start(None)
                .unwrap_or_else(|e| panic!("thread pool initialization failed: {e}"))
        })
    }

    /// Submit a task, transferring ownership to the pool.
    pub fn add(task: Box<dyn PoolTask>) {
        let pool = Self::instance();
        if task.attributes().is_high_priority() {
            pool.shared.queue.push_front(task);
        } else {
            pool.shared.queue.push_back(task);
        }
    }

    /// Submit a batch of tasks.
    pub fn add_all(tasks: Vec<Box<dyn PoolTask>>) {
        for task in tasks {
            Self::add(task);
        }
    }

    /// Run one queued task on the calling thread, without blocking.
    ///
    /// Returns whether a task ran. Lets an otherwise idle client thread
    /// contribute instead of waiting.
    pub fn run_one_task() -> bool {
        match Self::instance().shared.queue.pop_front(false) {
            Some(task) => {
                run_task(task);
                true
            }
            None => false,
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size() -> usize {
        Self::instance().nthreads
    }

    /// Snapshot of the task queue's counters.
    pub fn stats() -> DequeStats {
        Self::instance().shared.queue.stats()
    }

    /// Shut the pool down: every worker finishes its current task, drains
    /// one wakeup, and exits. Returns once all workers have quiesced.
    ///
    /// Submissions after `end` are a client error; they are queued but
    /// never run, and corrupt nothing.
    pub fn end() {
        let pool = Self::instance();
        pool.shared.finish.store(true, Ordering::Release);
        debug!("pool shutdown: waking {} workers", pool.nthreads);
        for _ in 0..pool.nthreads {
            pool.shared.queue.push_back(Box::new(SentinelTask));
        }
        let mut waiter = Waiter::new();
        while pool.shared.nfinished.load(Ordering::Acquire) < pool.nthreads {
            waiter.wait();
        }
        for thread in pool.threads.lock().unwrap().iter_mut() {
            thread.join();
        }
        debug!("pool shutdown complete");
    }
}

/// Dispatch loop run by each worker.
///
/// The liveness counter is incremented on every exit path; `end` spins on
/// it, so a worker must count itself out exactly once.
fn worker_loop(shared: &PoolShared, index: usize) {
    set_affinity(AFFINITY_WORKER, Some(index));
    while !shared.finish.load(Ordering::Acquire) {
        if let Some(task) = shared.queue.pop_front(true) {
            run_task(task);
        }
    }
    shared.nfinished.fetch_add(1, Ordering::AcqRel);
    debug!("worker {index} finished");
}

/// Run a task, isolating the pool from its panics.
fn run_task(task: Box<dyn PoolTask>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        error!("task panicked: {}", panic_message(payload.as_ref()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("opaque panic payload")
}

fn already_initialized() -> Error {
    Error::InvalidConfig {
        message: "thread pool already initialized".into(),
    }
}

/// Worker count from the environment, else one less than the CPU count
/// (floored at one worker).
fn default_nthread() -> Result<usize> {
    match env::var(POOL_NTHREAD) {
        Ok(raw) => parse_nthread(&raw),
        Err(env::VarError::NotPresent) => Ok(ncpu().max(2) - 1),
        Err(env::VarError::NotUnicode(_)) => Err(Error::InvalidConfig {
            message: format!("{POOL_NTHREAD} is not valid unicode"),
        }),
    }
}

fn parse_nthread(raw: &str) -> Result<usize> {
    raw.trim().parse().map_err(|_| Error::InvalidConfig {
        message: format!("{POOL_NTHREAD} must be a decimal integer, got {raw:?}"),
    })
}

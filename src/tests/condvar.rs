use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::{BlockingCondVar, CondVar, RawLock};

/// A signal issued while a waiter is blocked wakes it; a signal issued
/// with nobody waiting is consumed by the next wait without blocking.
#[test]
fn signal_before_and_after_wait() {
    let cv = Arc::new(CondVar::new());

    let waiter = {
        let cv = Arc::clone(&cv);
        thread::spawn(move || {
            cv.lock();
            // SAFETY: lock held.
            unsafe { cv.wait() };
            cv.unlock();
        })
    };

    thread::sleep(Duration::from_millis(50));
    cv.lock();
    // SAFETY: lock held.
    unsafe { cv.signal() };
    cv.unlock();
    waiter.join().expect("waiter panicked");

    // Pre-posted signal: the next wait returns without blocking.
    cv.lock();
    // SAFETY: lock held.
    unsafe { cv.signal() };
    cv.unlock();

    let start = Instant::now();
    cv.lock();
    // SAFETY: lock held.
    unsafe { cv.wait() };
    cv.unlock();
    assert!(
        start.elapsed() < Duration::from_millis(100),
        "wait blocked despite a pending signal"
    );
}

/// Signals and waits balance: no signal is lost in any interleaving of a
/// signaler and a waiter repeatedly meeting at the same condvar.
#[test]
fn signals_and_waits_balance() {
    const ROUNDS: usize = 200;
    let cv = Arc::new(CondVar::new());
    let consumed = Arc::new(AtomicUsize::new(0));

    let waiter = {
        let cv = Arc::clone(&cv);
        let consumed = Arc::clone(&consumed);
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                cv.lock();
                // SAFETY: lock held.
                unsafe { cv.wait() };
                cv.unlock();
                consumed.fetch_add(1, Ordering::Relaxed);
            }
        })
    };

    for _ in 0..ROUNDS {
        cv.lock();
        // SAFETY: lock held.
        unsafe { cv.signal() };
        cv.unlock();
        if consumed.load(Ordering::Relaxed) % 7 == 0 {
            thread::yield_now();
        }
    }

    waiter.join().expect("waiter panicked");
    assert_eq!(consumed.load(Ordering::Relaxed), ROUNDS);
}

/// Blocked waiters wake in the order they waited.
#[test]
fn wakeups_are_fifo() {
    const WAITERS: usize = 4;
    let cv = Arc::new(CondVar::new());
    let woken = Arc::new(StdMutex::new(Vec::new()));

    let handles: Vec<_> = (0..WAITERS)
        .map(|id| {
            let cv = Arc::clone(&cv);
            let woken = Arc::clone(&woken);
            thread::spawn(move || {
                // Stagger entry so the wait order is the thread order.
                thread::sleep(Duration::from_millis(60 * (id as u64 + 1)));
                cv.lock();
                // SAFETY: lock held.
                unsafe { cv.wait() };
                cv.unlock();
                woken.lock().unwrap().push(id);
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(60 * (WAITERS as u64 + 1)));
    for expected in 1..=WAITERS {
        cv.lock();
        // SAFETY: lock held.
        unsafe { cv.signal() };
        cv.unlock();
        // One signal wakes exactly one waiter; wait for it to report
        // before the next, so the recorded order is the wake order.
        let deadline = Instant::now() + Duration::from_secs(5);
        while woken.lock().unwrap().len() < expected {
            assert!(Instant::now() < deadline, "waiter {expected} never woke");
            thread::yield_now();
        }
    }

    for h in handles {
        h.join().expect("waiter panicked");
    }
    assert_eq!(*woken.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn blocking_condvar_round_trip() {
    let cv = Arc::new(BlockingCondVar::new());
    let released = Arc::new(AtomicUsize::new(0));

    let waiter = {
        let cv = Arc::clone(&cv);
        let released = Arc::clone(&released);
        thread::spawn(move || {
            let mut guard = cv.lock().expect("lock poisoned");
            while released.load(Ordering::Acquire) == 0 {
                guard = cv.wait(guard).expect("wait failed");
            }
        })
    };

    thread::sleep(Duration::from_millis(50));
    released.store(1, Ordering::Release);
    cv.signal();
    waiter.join().expect("waiter panicked");

    // Broadcast with nobody waiting is a no-op.
    cv.broadcast();
}

//! At most one thread is ever inside a critical section guarded by an
//! exclusive lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use spinward::{Backoff, Lock, LockKind, ReentrantLock, SpinMutex};

const THREADS: usize = 8;
const ITERATIONS: usize = 2_000;

/// Runs the critical section on `THREADS` threads and returns
/// (highest occupancy seen, final counter).
fn hammer(lock: &(impl Lock + Sync)) -> (usize, usize) {
    let inside = AtomicUsize::new(0);
    let max_inside = AtomicUsize::new(0);
    // Deliberately a non-atomic read-modify-write: lost updates show up as a
    // short final count if two holders ever overlap.
    let total = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let _g = lock.guard();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    let v = total.load(Ordering::Relaxed);
                    total.store(v + 1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });

    (max_inside.into_inner(), total.into_inner())
}

#[test]
fn exclusive_kinds_never_admit_two_holders() {
    for kind in [
        LockKind::Spin,
        LockKind::SpinTas,
        LockKind::RwWrite,
        LockKind::Reentrant,
        LockKind::Monitor,
    ] {
        let lock = kind.build(1);
        let (max, total) = hammer(&lock);
        assert_eq!(max, 1, "{kind}: {max} concurrent holders");
        assert_eq!(total, THREADS * ITERATIONS, "{kind}: lost updates");
    }
}

#[test]
fn backoff_policies_preserve_exclusion() {
    for backoff in Backoff::ALL {
        let lock = LockKind::Spin.build_with(1, backoff);
        let (max, total) = hammer(&lock);
        assert_eq!(max, 1, "{}", backoff.name());
        assert_eq!(total, THREADS * ITERATIONS);
    }
}

#[test]
fn ticket_lock_excludes_and_loses_nothing() {
    // Waiters yield: the next ticket may belong to a thread that is not
    // running, and a fair lock cannot skip it.
    let lock = LockKind::Ticket.build_with(1, Backoff::Yield);
    let (max, total) = hammer(&lock);
    assert_eq!(max, 1);
    assert_eq!(total, THREADS * ITERATIONS);
}

#[test]
fn capacity_one_semaphore_is_a_mutex() {
    let lock = LockKind::Semaphore.build(1);
    let (max, total) = hammer(&lock);
    assert_eq!(max, 1);
    assert_eq!(total, THREADS * ITERATIONS);
}

#[test]
fn reentrant_lock_excludes_while_nested() {
    let lock = ReentrantLock::new();
    let inside = AtomicUsize::new(0);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS / 10 {
                    let _outer = lock.lock();
                    let _inner = lock.lock();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    assert_eq!(lock.depth(), 2);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });
    assert_eq!(lock.depth(), 0);
    assert_eq!(lock.owner(), None);
}

#[test]
fn spin_mutex_counts_exactly() {
    let counter = SpinMutex::new(0usize);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    *counter.lock() += 1;
                }
            });
        }
    });
    assert_eq!(counter.into_inner(), THREADS * ITERATIONS);
}

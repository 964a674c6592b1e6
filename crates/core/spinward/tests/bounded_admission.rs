//! A counting semaphore never admits more than its capacity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use spinward::{Backoff, BlockingSemaphore, Semaphore, SpinSemaphore};

const THREADS: usize = 10;
const ITERATIONS: usize = 10_000;

fn max_admitted(sem: &(impl Semaphore + Sync), iterations: usize) -> usize {
    let inside = AtomicUsize::new(0);
    let max_inside = AtomicUsize::new(0);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..iterations {
                    let _permit = sem.guard();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    assert!(
                        now <= sem.capacity(),
                        "{now} holders admitted, capacity {}",
                        sem.capacity()
                    );
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });
    max_inside.into_inner()
}

#[test]
fn spin_semaphore_capacity_three() {
    let sem = SpinSemaphore::new(3);
    let max = max_admitted(&sem, ITERATIONS);
    assert!((1..=3).contains(&max));
    assert_eq!(sem.in_use(), 0);
}

#[test]
fn spin_semaphore_with_yield_backoff() {
    let sem = SpinSemaphore::with_backoff(2, Backoff::Yield);
    assert!(max_admitted(&sem, ITERATIONS / 10) <= 2);
    assert_eq!(sem.in_use(), 0);
}

#[test]
fn blocking_semaphore_capacity_three() {
    let sem = BlockingSemaphore::new(3);
    let max = max_admitted(&sem, ITERATIONS / 10);
    assert!((1..=3).contains(&max));
    assert_eq!(sem.in_use(), 0);
}

#[test]
fn capacity_above_thread_count_never_blocks() {
    let sem = SpinSemaphore::new(THREADS + 1);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let _p = sem.permit();
                assert!(sem.in_use() <= THREADS);
            });
        }
    });
    assert_eq!(sem.in_use(), 0);
}

//! A writer's critical section overlaps no other writer and no reader;
//! readers may overlap each other.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use spinward::{Backoff, ReaderWriterLock, RwLock};

const READERS: usize = 6;
const WRITERS: usize = 2;
const ITERATIONS: usize = 2_000;

#[test]
fn writers_exclude_everyone() {
    let lock = ReaderWriterLock::with_backoff(Backoff::Exponential);
    let readers_in = AtomicUsize::new(0);
    let writers_in = AtomicUsize::new(0);
    let max_readers = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let _r = lock.read();
                    let now = readers_in.fetch_add(1, Ordering::SeqCst) + 1;
                    max_readers.fetch_max(now, Ordering::SeqCst);
                    assert_eq!(writers_in.load(Ordering::SeqCst), 0, "reader overlapped a writer");
                    readers_in.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
        for _ in 0..WRITERS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let _w = lock.write();
                    assert_eq!(writers_in.fetch_add(1, Ordering::SeqCst), 0, "two writers");
                    assert_eq!(readers_in.load(Ordering::SeqCst), 0, "writer overlapped a reader");
                    writers_in.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(lock.readers(), 0);
    assert_eq!(lock.writers_pending(), 0);
    assert!(max_readers.into_inner() >= 1);
}

#[test]
fn readers_overlap_freely() {
    let lock = ReaderWriterLock::new();
    let readers_in = AtomicUsize::new(0);
    let all_in = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                let _r = lock.read();
                readers_in.fetch_add(1, Ordering::SeqCst);
                // Hold until every reader is inside at once.
                while readers_in.load(Ordering::SeqCst) < READERS {
                    thread::yield_now();
                }
                all_in.store(true, Ordering::SeqCst);
            });
        }
    });

    assert!(all_in.into_inner());
}

#[test]
fn guarded_data_stays_consistent() {
    // Writers keep the two halves equal; a torn read would see them differ.
    let pair = RwLock::new((0u64, 0u64));
    thread::scope(|s| {
        for _ in 0..WRITERS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let mut w = pair.write();
                    w.0 += 1;
                    w.1 += 1;
                }
            });
        }
        for _ in 0..READERS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let r = pair.read();
                    assert_eq!(r.0, r.1);
                }
            });
        }
    });
    let (a, b) = pair.into_inner();
    assert_eq!(a, (WRITERS * ITERATIONS) as u64);
    assert_eq!(a, b);
}

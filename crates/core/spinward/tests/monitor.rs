//! Consumers waiting on a monitor predicate only read the shared buffer
//! after observing `ready`, even when woken spuriously first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use spinward::{Monitor, MonitorLock};

#[derive(Default)]
struct Mailbox {
    ready: bool,
    buffer: Vec<u32>,
}

const CONSUMERS: usize = 5;
const SPURIOUS: usize = 20;

#[test]
fn consumers_see_buffer_only_when_ready() {
    let mailbox = Monitor::new(Mailbox::default());
    let waiting = AtomicUsize::new(0);

    thread::scope(|s| {
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                s.spawn(|| {
                    let mut wakes = 0usize;
                    let mut guard = mailbox.enter();
                    waiting.fetch_add(1, Ordering::SeqCst);
                    while !guard.ready {
                        assert!(guard.buffer.is_empty(), "buffer visible before ready");
                        guard = guard.wait();
                        wakes += 1;
                    }
                    assert_eq!(guard.buffer, [1, 2, 3]);
                    wakes
                })
            })
            .collect();

        while waiting.load(Ordering::SeqCst) < CONSUMERS {
            thread::yield_now();
        }
        // Wake everyone without changing the predicate.
        for _ in 0..SPURIOUS {
            mailbox.notify_all();
            thread::yield_now();
        }
        mailbox.with(|m| {
            m.buffer.extend([1, 2, 3]);
            m.ready = true;
        });
        mailbox.notify_all();

        for c in consumers {
            assert!(c.join().unwrap() >= 1);
        }
    });
}

#[test]
fn wait_until_absorbs_spurious_wakeups() {
    let value = Monitor::new(0u32);
    thread::scope(|s| {
        let consumer = s.spawn(|| *value.enter().wait_until(|v| *v == 3));
        for v in 1..=3 {
            value.with(|x| *x = v);
            value.notify_all();
        }
        assert_eq!(consumer.join().unwrap(), 3);
    });
}

#[test]
fn monitor_lock_serializes_counter() {
    let lock = MonitorLock::new();
    let total = AtomicUsize::new(0);
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..1_000 {
                    let _g = lock.lock();
                    let v = total.load(Ordering::Relaxed);
                    total.store(v + 1, Ordering::Relaxed);
                }
            });
        }
    });
    assert_eq!(total.into_inner(), 4_000);
}

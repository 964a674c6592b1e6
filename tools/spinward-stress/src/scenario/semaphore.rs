//! A counting semaphore never admits more holders than its capacity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use spinward::{AnyLock, Backoff, Lock, LockKind};

use super::{ScenarioReport, Watch};

/// Resolved parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub capacity: usize,
    pub threads: usize,
    pub iterations: usize,
    pub blocking: bool,
    pub backoff: Backoff,
}

impl Params {
    fn build(&self) -> AnyLock {
        let kind = if self.blocking {
            LockKind::BlockingSemaphore
        } else {
            LockKind::Semaphore
        };
        kind.build_with(self.capacity, self.backoff)
    }
}

pub fn run(p: &Params, watch: Watch) -> Result<ScenarioReport> {
    let sem = p.build();
    spinward::sw_info!(
        "semaphore: capacity {}, {} threads x {} cycles on {}",
        p.capacity,
        p.threads,
        p.iterations,
        sem.kind()
    );
    let started = Instant::now();
    let inside = AtomicUsize::new(0);
    let max_inside = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..p.threads {
            s.spawn(|| {
                for _ in 0..p.iterations {
                    if watch.stopped() {
                        break;
                    }
                    let _permit = sem.guard();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::Relaxed);
                    watch.at_most("holders admitted", now, p.capacity);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });

    watch.finish("semaphore")?;
    Ok(ScenarioReport::new("semaphore", sem.kind(), started)
        .metric("capacity", p.capacity)
        .metric("max-inside", max_inside.into_inner()))
}

//! Lock-throughput comparison.
//!
//! For each lock kind, workers meet on a [`SpinBarrier`], loop through
//! acquire / hold / release until the timer raises the stop flag, then meet
//! again so every count covers the same window.

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde::Serialize;
use spinward::{Backoff, Lock, LockKind, SpinBarrier};

/// Resolved parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub kinds: Vec<LockKind>,
    pub workers: usize,
    /// Busy iterations inside each critical section.
    pub hold: u64,
    pub duration: Duration,
    pub backoff: Backoff,
}

/// Measurements for one lock kind.
#[derive(Debug, Serialize)]
pub struct BenchResult {
    pub kind: LockKind,
    pub backoff: Backoff,
    pub workers: usize,
    pub hold: u64,
    pub elapsed_ms: u128,
    /// Critical sections completed by each worker.
    pub per_worker: Vec<u64>,
    pub total: u64,
}

impl BenchResult {
    /// Critical sections per second across all workers.
    pub fn ops_per_sec(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.total as f64 * 1000.0 / self.elapsed_ms as f64
    }

    /// Ratio of the slowest worker's count to the fastest one's (1.0 = fair).
    pub fn fairness(&self) -> f64 {
        let max = self.per_worker.iter().copied().max().unwrap_or(0);
        let min = self.per_worker.iter().copied().min().unwrap_or(0);
        if max == 0 {
            return 0.0;
        }
        min as f64 / max as f64
    }
}

/// Measures every kind in `p.kinds`, one after another.
pub fn run(p: &Params) -> Result<Vec<BenchResult>> {
    p.kinds.iter().map(|&kind| run_one(kind, p)).collect()
}

fn hold(n: u64) {
    for i in 0..n {
        black_box(i);
    }
}

fn run_one(kind: LockKind, p: &Params) -> Result<BenchResult> {
    spinward::sw_info!(
        "bench: {} with {} workers, hold {}, {:?}",
        kind,
        p.workers,
        p.hold,
        p.duration
    );
    let lock = kind.build_with(1, p.backoff);
    let start = SpinBarrier::with_backoff(p.workers + 1, Backoff::Yield);
    let end = SpinBarrier::with_backoff(p.workers + 1, Backoff::Yield);
    let stop = AtomicBool::new(false);

    let (per_worker, elapsed) = thread::scope(|s| {
        let handles: Vec<_> = (0..p.workers)
            .map(|_| {
                s.spawn(|| {
                    start.arrive_and_wait();
                    let mut done = 0u64;
                    while !stop.load(Ordering::Relaxed) {
                        lock.acquire();
                        hold(p.hold);
                        lock.release();
                        done += 1;
                    }
                    end.arrive_and_wait();
                    done
                })
            })
            .collect();

        start.arrive_and_wait();
        let started = Instant::now();
        thread::sleep(p.duration);
        stop.store(true, Ordering::Relaxed);
        end.arrive_and_wait();
        let elapsed = started.elapsed();

        let counts = handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("bench: {kind} worker panicked")))
            .collect::<Result<Vec<u64>>>();
        counts.map(|c| (c, elapsed))
    })?;

    let total = per_worker.iter().sum();
    spinward::sw_debug!("bench: {} finished {} critical sections", kind, total);
    Ok(BenchResult {
        kind,
        backoff: p.backoff,
        workers: p.workers,
        hold: p.hold,
        elapsed_ms: elapsed.as_millis(),
        per_worker,
        total,
    })
}

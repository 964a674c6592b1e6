//! An exclusive lock never admits two holders and loses no updates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use spinward::{Backoff, Lock, LockKind};

use super::{ScenarioReport, Watch};

/// Resolved parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub kind: LockKind,
    pub threads: usize,
    pub iterations: usize,
    pub backoff: Backoff,
}

pub fn run(p: &Params, watch: Watch) -> Result<ScenarioReport> {
    spinward::sw_info!(
        "mutex: {} threads x {} iterations on {} ({} backoff)",
        p.threads,
        p.iterations,
        p.kind,
        p.backoff.name()
    );
    let started = Instant::now();
    let lock = p.kind.build_with(1, p.backoff);
    let inside = AtomicUsize::new(0);
    let max_inside = AtomicUsize::new(0);
    // Updated with a plain load/store pair; overlapping holders lose counts.
    let count = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..p.threads {
            s.spawn(|| {
                for _ in 0..p.iterations {
                    if watch.stopped() {
                        break;
                    }
                    let _g = lock.guard();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::Relaxed);
                    watch.at_most("holders inside the critical section", now, 1);
                    let v = count.load(Ordering::Relaxed);
                    count.store(v + 1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });

    let count = count.into_inner();
    let expected = p.threads * p.iterations;
    spinward::sw_debug!("mutex: COUNT = {} (expected = {})", count, expected);
    if !watch.stopped() {
        watch.exactly("final count", count, expected);
    }
    watch.finish("mutex")?;

    Ok(ScenarioReport::new("mutex", p.kind, started)
        .metric("count", count)
        .metric("max-inside", max_inside.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exclusive_kind_passes() {
        for kind in [
            LockKind::Spin,
            LockKind::SpinTas,
            LockKind::Ticket,
            LockKind::RwWrite,
            LockKind::Reentrant,
            LockKind::Monitor,
        ] {
            let p = Params {
                kind,
                threads: 4,
                iterations: 500,
                backoff: Backoff::Yield,
            };
            let report = run(&p, Watch::new(false)).unwrap();
            assert_eq!(report.metrics["count"], 2_000);
            assert_eq!(report.metrics["max-inside"], 1);
        }
    }
}

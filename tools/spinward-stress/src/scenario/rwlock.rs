//! Writers exclude writers and readers; readers may overlap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use spinward::{Backoff, ReaderWriterLock};

use super::{ScenarioReport, Watch};

/// Resolved parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub readers: usize,
    pub writers: usize,
    pub iterations: usize,
    pub backoff: Backoff,
}

pub fn run(p: &Params, watch: Watch) -> Result<ScenarioReport> {
    spinward::sw_info!(
        "rwlock: {} readers + {} writers x {} iterations",
        p.readers,
        p.writers,
        p.iterations
    );
    let started = Instant::now();
    let lock = ReaderWriterLock::with_backoff(p.backoff);
    let readers_in = AtomicUsize::new(0);
    let writers_in = AtomicUsize::new(0);
    let max_readers = AtomicUsize::new(0);
    let writes = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..p.readers {
            s.spawn(|| {
                for _ in 0..p.iterations {
                    if watch.stopped() {
                        break;
                    }
                    let _r = lock.read();
                    let now = readers_in.fetch_add(1, Ordering::SeqCst) + 1;
                    max_readers.fetch_max(now, Ordering::Relaxed);
                    watch.at_most("writers while reading", writers_in.load(Ordering::SeqCst), 0);
                    readers_in.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
        for _ in 0..p.writers {
            s.spawn(|| {
                for _ in 0..p.iterations {
                    if watch.stopped() {
                        break;
                    }
                    let _w = lock.write();
                    let now = writers_in.fetch_add(1, Ordering::SeqCst) + 1;
                    watch.at_most("writers while writing", now, 1);
                    watch.at_most("readers while writing", readers_in.load(Ordering::SeqCst), 0);
                    let v = writes.load(Ordering::Relaxed);
                    writes.store(v + 1, Ordering::Relaxed);
                    writers_in.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });

    if !watch.stopped() {
        watch.exactly("writes", writes.into_inner(), p.writers * p.iterations);
        watch.exactly("readers left inside", lock.readers(), 0);
        watch.exactly("writers left pending", lock.writers_pending(), 0);
    }
    watch.finish("rwlock")?;

    let max_readers = max_readers.into_inner();
    if max_readers > 1 {
        spinward::sw_debug!("rwlock: up to {} readers overlapped", max_readers);
    }
    Ok(ScenarioReport::new("rwlock", "reader-writer", started)
        .metric("max-readers", max_readers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_load_passes() {
        let p = Params {
            readers: 4,
            writers: 2,
            iterations: 500,
            backoff: Backoff::Exponential,
        };
        let report = run(&p, Watch::new(false)).unwrap();
        assert!(report.metrics["max-readers"] >= 1);
    }
}

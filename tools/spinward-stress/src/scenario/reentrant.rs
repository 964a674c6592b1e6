//! Recursive acquisition never self-deadlocks, and only the holder is ever
//! recorded as owner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use spinward::{OwnerId, ReentrantLock};

use super::{ScenarioReport, Watch};

/// Resolved parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub depth: usize,
    pub threads: usize,
    pub iterations: usize,
}

struct Shared<'a> {
    lock: &'a ReentrantLock,
    inside: &'a AtomicUsize,
    watch: &'a Watch,
    depth: usize,
}

fn recurse(s: &Shared<'_>, me: OwnerId, level: usize) {
    s.lock.acquire(me);
    if level == 1 {
        s.watch
            .at_most("threads inside", s.inside.fetch_add(1, Ordering::SeqCst) + 1, 1);
    }
    if s.lock.owner() != Some(me) {
        s.watch.exactly("owner id", s.lock.owner().map_or(0, OwnerId::get), me.get());
    }
    s.watch.exactly("depth", s.lock.depth(), level);

    if level < s.depth {
        recurse(s, me, level + 1);
    }

    if level == 1 {
        s.inside.fetch_sub(1, Ordering::SeqCst);
    }
    s.lock.release_as(me);
}

pub fn run(p: &Params, watch: Watch) -> Result<ScenarioReport> {
    spinward::sw_info!(
        "reentrant: depth {}, {} threads x {} iterations",
        p.depth,
        p.threads,
        p.iterations
    );
    let started = Instant::now();
    let lock = ReentrantLock::new();
    let inside = AtomicUsize::new(0);
    let shared = Shared {
        lock: &lock,
        inside: &inside,
        watch: &watch,
        depth: p.depth,
    };

    thread::scope(|s| {
        for _ in 0..p.threads {
            s.spawn(|| {
                let me = OwnerId::current();
                for _ in 0..p.iterations {
                    if shared.watch.stopped() {
                        break;
                    }
                    recurse(&shared, me, 1);
                }
            });
        }
    });

    watch.exactly("depth after run", lock.depth(), 0);
    watch.exactly("owner after run", lock.owner().map_or(0, OwnerId::get), 0);
    watch.finish("reentrant")?;

    Ok(ScenarioReport::new("reentrant", "reentrant", started).metric("depth", p.depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_threads_pass() {
        let p = Params {
            depth: 10,
            threads: 4,
            iterations: 200,
        };
        let report = run(&p, Watch::new(false)).unwrap();
        assert_eq!(report.metrics["depth"], 10);
    }
}

//! No participant leaves a round early, and rounds reuse one barrier.
//!
//! Workers never stop early here: a participant that left would strand the
//! rest at the next round.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Result;
use spinward::{Backoff, BarrierKind, Rendezvous};

use super::{ScenarioReport, Watch};

/// Resolved parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub participants: usize,
    pub rounds: usize,
    pub kind: BarrierKind,
    pub backoff: Backoff,
}

pub fn run(p: &Params, watch: Watch) -> Result<ScenarioReport> {
    spinward::sw_info!(
        "barrier: {} participants x {} rounds on {}",
        p.participants,
        p.rounds,
        p.kind
    );
    let started = Instant::now();
    let barrier = p.kind.build(p.participants, p.backoff);
    let arrivals: Vec<AtomicUsize> = (0..p.rounds).map(|_| AtomicUsize::new(0)).collect();
    let leaders = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..p.participants {
            s.spawn(|| {
                for (round, arrived) in arrivals.iter().enumerate() {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    let result = barrier.arrive_and_wait();
                    watch.exactly(
                        "arrivals seen on leaving a round",
                        arrived.load(Ordering::SeqCst),
                        p.participants,
                    );
                    watch.exactly("generation on leaving a round", result.generation(), round);
                    if result.is_leader() {
                        leaders.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let leaders = leaders.into_inner();
    watch.exactly("leaders", leaders, p.rounds);
    watch.finish("barrier")?;

    Ok(ScenarioReport::new("barrier", p.kind, started)
        .metric("rounds", p.rounds)
        .metric("generation", barrier.generation()))
}

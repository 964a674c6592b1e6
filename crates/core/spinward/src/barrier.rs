//! Reusable rendezvous barriers.
//!
//! Both barriers count arrivals within a *generation*. The arrival that
//! completes a generation resets the count and advances the generation;
//! everyone else waits for the generation to move past the value it saw on
//! arrival. A thread that races ahead into the next round therefore cannot
//! disturb the count of the round still draining.

use core::fmt;

use crate::atomic::AtomicCell;
use crate::backoff::Backoff;
use crate::lock::Rendezvous;
use crate::monitor::Monitor;

/// Returned by `arrive_and_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    leader: bool,
    generation: usize,
}

impl BarrierWaitResult {
    /// `true` for exactly one participant per generation: the one whose
    /// arrival completed it.
    pub const fn is_leader(&self) -> bool {
        self.leader
    }

    /// The generation this wait belonged to, counting from zero.
    pub const fn generation(&self) -> usize {
        self.generation
    }
}

const fn check_target(target: usize) {
    assert!(target > 0, "barrier needs at least one participant");
}

fn note_first_arrival(target: usize, generation: usize) {
    if target == 1 && generation == 0 {
        crate::sw_debug!("barrier with a single participant never waits");
    }
}

/// Busy-waiting barrier.
pub struct SpinBarrier {
    arrived: AtomicCell,
    generation: AtomicCell,
    target: usize,
    backoff: Backoff,
}

impl SpinBarrier {
    /// Creates a barrier for `target` participants.
    ///
    /// # Panics
    ///
    /// Panics if `target` is zero.
    pub const fn new(target: usize) -> Self {
        Self::with_backoff(target, Backoff::None)
    }

    /// Like [`SpinBarrier::new`], pacing the wait loop with `backoff`.
    pub const fn with_backoff(target: usize, backoff: Backoff) -> Self {
        check_target(target);
        Self {
            arrived: AtomicCell::new(0),
            generation: AtomicCell::new(0),
            target,
            backoff,
        }
    }

    /// Arrives and spins until all `target` participants of this generation
    /// have arrived.
    pub fn arrive_and_wait(&self) -> BarrierWaitResult {
        // Must be read before arriving: once we are counted, the generation
        // can advance at any moment.
        let seen = self.generation.load();
        note_first_arrival(self.target, seen);
        let arrived = self.arrived.increment();
        crate::sw_invariant!(
            arrived <= self.target,
            "barrier overfilled: {} arrivals for {} participants",
            arrived,
            self.target
        );

        if arrived == self.target {
            self.arrived.store_release(0);
            self.generation.increment();
            return BarrierWaitResult {
                leader: true,
                generation: seen,
            };
        }

        let mut backoff = self.backoff.waiter();
        while self.generation.load() == seen {
            backoff.snooze();
        }
        BarrierWaitResult {
            leader: false,
            generation: seen,
        }
    }

    /// Number of participants per generation.
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Number of completed generations.
    pub fn generation(&self) -> usize {
        self.generation.load()
    }
}

impl fmt::Debug for SpinBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinBarrier")
            .field("arrived", &self.arrived.peek())
            .field("target", &self.target)
            .field("generation", &self.generation.peek())
            .finish_non_exhaustive()
    }
}

impl Rendezvous for SpinBarrier {
    fn arrive_and_wait(&self) -> BarrierWaitResult {
        SpinBarrier::arrive_and_wait(self)
    }

    fn participants(&self) -> usize {
        self.target
    }
}

#[derive(Debug)]
struct Round {
    arrived: usize,
    generation: usize,
}

/// Barrier whose waiters sleep on a [`Monitor`].
pub struct BlockingBarrier {
    round: Monitor<Round>,
    target: usize,
}

impl BlockingBarrier {
    /// Creates a barrier for `target` participants.
    ///
    /// # Panics
    ///
    /// Panics if `target` is zero.
    pub const fn new(target: usize) -> Self {
        check_target(target);
        Self {
            round: Monitor::new(Round {
                arrived: 0,
                generation: 0,
            }),
            target,
        }
    }

    /// Arrives and sleeps until all `target` participants of this
    /// generation have arrived.
    pub fn arrive_and_wait(&self) -> BarrierWaitResult {
        let mut round = self.round.enter();
        let seen = round.generation;
        note_first_arrival(self.target, seen);
        round.arrived += 1;

        if round.arrived == self.target {
            round.arrived = 0;
            round.generation = seen.wrapping_add(1);
            drop(round);
            self.round.notify_all();
            return BarrierWaitResult {
                leader: true,
                generation: seen,
            };
        }

        let _round = round.wait_until(|r| r.generation != seen);
        BarrierWaitResult {
            leader: false,
            generation: seen,
        }
    }

    /// Number of participants per generation.
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Number of completed generations.
    pub fn generation(&self) -> usize {
        self.round.with(|r| r.generation)
    }
}

impl fmt::Debug for BlockingBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingBarrier")
            .field("round", &self.round)
            .field("target", &self.target)
            .finish()
    }
}

impl Rendezvous for BlockingBarrier {
    fn arrive_and_wait(&self) -> BarrierWaitResult {
        BlockingBarrier::arrive_and_wait(self)
    }

    fn participants(&self) -> usize {
        self.target
    }
}

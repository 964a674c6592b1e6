//! No participant leaves a generation before every participant has arrived,
//! and the barrier is reusable round after round.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use spinward::{Backoff, BarrierKind, Rendezvous};

const PARTICIPANTS: usize = 6;
const ROUNDS: usize = 200;

fn check_rounds(barrier: &(impl Rendezvous + Sync)) {
    // arrivals[r] counts participants that reached round r.
    let arrivals: Vec<AtomicUsize> = (0..ROUNDS).map(|_| AtomicUsize::new(0)).collect();
    let leaders = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..barrier.participants() {
            s.spawn(|| {
                for (round, arrived) in arrivals.iter().enumerate() {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    let result = barrier.arrive_and_wait();
                    assert_eq!(
                        arrived.load(Ordering::SeqCst),
                        barrier.participants(),
                        "left round {round} early"
                    );
                    assert_eq!(result.generation(), round);
                    if result.is_leader() {
                        leaders.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert_eq!(leaders.into_inner(), ROUNDS);
}

#[test]
fn spin_barrier_rounds() {
    let barrier = BarrierKind::Spin.build(PARTICIPANTS, Backoff::Yield);
    check_rounds(&barrier);
    assert_eq!(barrier.generation(), ROUNDS);
}

#[test]
fn spin_barrier_rounds_without_backoff() {
    let barrier = BarrierKind::Spin.build(2, Backoff::None);
    check_rounds(&barrier);
}

#[test]
fn blocking_barrier_rounds() {
    let barrier = BarrierKind::Blocking.build(PARTICIPANTS, Backoff::None);
    check_rounds(&barrier);
    assert_eq!(barrier.generation(), ROUNDS);
}

#[test]
fn fast_thread_cannot_corrupt_next_round() {
    // One participant races through rounds while the other dawdles; a
    // count shared across rounds would let the fast one complete a round
    // alone.
    let barrier = BarrierKind::Spin.build(2, Backoff::Yield);
    let slow_round = AtomicUsize::new(0);
    thread::scope(|s| {
        s.spawn(|| {
            for round in 0..ROUNDS {
                barrier.arrive_and_wait();
                assert!(slow_round.load(Ordering::SeqCst) >= round);
            }
        });
        s.spawn(|| {
            for round in 0..ROUNDS {
                slow_round.store(round, Ordering::SeqCst);
                for _ in 0..100 {
                    std::hint::spin_loop();
                }
                barrier.arrive_and_wait();
            }
        });
    });
}

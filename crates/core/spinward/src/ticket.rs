//! First-come, first-served spinlock.
//!
//! Each acquirer draws a ticket from `next` with one fetch-and-add and spins
//! until `serving` reaches it. Release hands the lock to the next ticket, so
//! holders are admitted strictly in arrival order and no waiter starves.
//! Every waiter polls the same `serving` word, so a release invalidates the
//! cache line of every spinner.

use core::fmt;

use crate::atomic::AtomicCell;
use crate::backoff::Backoff;
use crate::lock::{Lock, LockGuard};

/// A fair, busy-waiting mutual exclusion lock.
pub struct TicketLock {
    next: AtomicCell,
    serving: AtomicCell,
    backoff: Backoff,
}

/// Guard returned by [`TicketLock::lock`].
pub type TicketGuard<'a> = LockGuard<'a, TicketLock>;

impl TicketLock {
    /// Creates an unlocked ticket lock.
    pub const fn new() -> Self {
        Self::with_backoff(Backoff::None)
    }

    /// Creates an unlocked lock whose waiters poll with `backoff`.
    pub const fn with_backoff(backoff: Backoff) -> Self {
        Self {
            next: AtomicCell::new(0),
            serving: AtomicCell::new(0),
            backoff,
        }
    }

    /// Draws a ticket and spins until it is served.
    pub fn acquire(&self) {
        let ticket = self.next.fetch_add(1);
        let mut backoff = self.backoff.waiter();
        while self.serving.load() != ticket {
            backoff.snooze();
        }
    }

    /// Takes the lock only if nobody holds or waits for it.
    pub fn try_acquire(&self) -> bool {
        let serving = self.serving.load();
        self.next
            .compare_and_swap(serving, serving.wrapping_add(1))
    }

    /// Serves the next ticket.
    ///
    /// Must only be called by the current holder.
    pub fn release(&self) {
        crate::sw_invariant!(self.is_locked(), "release of an unlocked ticket lock");
        self.serving.fetch_add(1);
    }

    /// Returns `true` if some thread holds the lock (racy snapshot).
    pub fn is_locked(&self) -> bool {
        self.queued() > 0
    }

    /// The holder plus every waiter that has drawn a ticket (racy snapshot).
    pub fn queued(&self) -> usize {
        self.next.load().wrapping_sub(self.serving.load())
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    pub fn lock(&self) -> TicketGuard<'_> {
        Lock::guard(self)
    }
}

impl Default for TicketLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TicketLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketLock")
            .field("next", &self.next.peek())
            .field("serving", &self.serving.peek())
            .finish_non_exhaustive()
    }
}

impl Lock for TicketLock {
    fn acquire(&self) {
        TicketLock::acquire(self);
    }

    fn release(&self) {
        TicketLock::release(self);
    }

    fn try_acquire(&self) -> bool {
        TicketLock::try_acquire(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spinlock::SpinMutex;
    use std::thread;

    #[test]
    fn try_acquire_fails_when_held() {
        let lock = TicketLock::new();
        let guard = lock.lock();
        assert!(lock.is_locked());
        assert!(!lock.try_acquire());
        assert_eq!(lock.queued(), 1);
        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn waiters_are_served_in_arrival_order() {
        let lock = TicketLock::with_backoff(Backoff::Yield);
        let order = SpinMutex::new(Vec::new());
        let (lock, order_ref) = (&lock, &order);

        lock.acquire();
        thread::scope(|s| {
            for i in 0..4 {
                s.spawn(move || {
                    let _g = lock.lock();
                    order_ref.lock().push(i);
                });
                // Thread `i` has drawn its ticket once the queue grows.
                while lock.queued() < i + 2 {
                    thread::yield_now();
                }
            }
            lock.release();
        });

        assert_eq!(order.into_inner(), [0, 1, 2, 3]);
        assert_eq!(lock.queued(), 0);
    }
}

//! Counting semaphores: at most `capacity` holders at once.
//!
//! [`SpinSemaphore`] admits optimistically. A waiter that saw room
//! increments the count and checks the result; if it overshot because other
//! waiters passed the same check, it rolls its increment back and retries.
//! The overshoot is transient and never visible as an admission.
//!
//! [`BlockingSemaphore`] keeps the count in a [`Monitor`] and sleeps while
//! the semaphore is full.

use core::fmt;

use crate::atomic::AtomicCell;
use crate::backoff::Backoff;
use crate::lock::{Lock, LockGuard};
use crate::monitor::Monitor;

/// Guard for one admission, released on drop.
pub type SemaphorePermit<'a, S> = LockGuard<'a, S>;

/// A bounded-admission counter.
pub trait Semaphore: Lock {
    /// Maximum number of simultaneous holders.
    fn capacity(&self) -> usize;

    /// Number of holders right now (racy snapshot).
    fn in_use(&self) -> usize;
}

/// Busy-waiting counting semaphore.
pub struct SpinSemaphore {
    count: AtomicCell,
    capacity: usize,
    backoff: Backoff,
}

impl SpinSemaphore {
    /// Creates a semaphore admitting up to `capacity` holders.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub const fn new(capacity: usize) -> Self {
        Self::with_backoff(capacity, Backoff::None)
    }

    /// Like [`SpinSemaphore::new`], pacing the wait loop with `backoff`.
    pub const fn with_backoff(capacity: usize, backoff: Backoff) -> Self {
        assert!(capacity > 0, "semaphore capacity must be at least 1");
        Self {
            count: AtomicCell::new(0),
            capacity,
            backoff,
        }
    }

    /// Waits until a slot is free and takes it.
    pub fn acquire(&self) {
        let mut backoff = self.backoff.waiter();
        loop {
            while self.count.peek() >= self.capacity {
                backoff.snooze();
            }
            if self.admit() {
                return;
            }
        }
    }

    /// Takes a slot if one looks free, without waiting.
    pub fn try_acquire(&self) -> bool {
        self.count.peek() < self.capacity && self.admit()
    }

    /// One optimistic increment, rolled back if it went past capacity.
    fn admit(&self) -> bool {
        if self.count.increment() <= self.capacity {
            true
        } else {
            self.count.decrement();
            false
        }
    }

    /// Gives back a slot.
    pub fn release(&self) {
        let prev = self.count.fetch_sub(1);
        crate::sw_invariant!(prev > 0, "semaphore released with no holders");
    }

    /// Acquires a slot and returns a permit that releases it on drop.
    pub fn permit(&self) -> SemaphorePermit<'_, Self> {
        Lock::guard(self)
    }

    /// Maximum number of simultaneous holders.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current count, including transient optimistic increments.
    pub fn in_use(&self) -> usize {
        self.count.peek()
    }
}

impl fmt::Debug for SpinSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinSemaphore")
            .field("in_use", &self.in_use())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Lock for SpinSemaphore {
    fn acquire(&self) {
        SpinSemaphore::acquire(self);
    }

    fn release(&self) {
        SpinSemaphore::release(self);
    }

    fn try_acquire(&self) -> bool {
        SpinSemaphore::try_acquire(self)
    }
}

impl Semaphore for SpinSemaphore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn in_use(&self) -> usize {
        SpinSemaphore::in_use(self)
    }
}

/// Counting semaphore whose waiters sleep on a [`Monitor`].
pub struct BlockingSemaphore {
    count: Monitor<usize>,
    capacity: usize,
}

impl BlockingSemaphore {
    /// Creates a semaphore admitting up to `capacity` holders.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub const fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "semaphore capacity must be at least 1");
        Self {
            count: Monitor::new(0),
            capacity,
        }
    }

    /// Sleeps until a slot is free and takes it.
    pub fn acquire(&self) {
        let mut count = self.count.enter().wait_until(|c| *c < self.capacity);
        *count += 1;
    }

    /// Takes a slot if one is free.
    pub fn try_acquire(&self) -> bool {
        self.count.with(|c| {
            let admitted = *c < self.capacity;
            if admitted {
                *c += 1;
            }
            admitted
        })
    }

    /// Gives back a slot and wakes one sleeper.
    pub fn release(&self) {
        self.count.with(|c| {
            crate::sw_invariant!(*c > 0, "semaphore released with no holders");
            *c = c.saturating_sub(1);
        });
        self.count.notify_one();
    }

    /// Acquires a slot and returns a permit that releases it on drop.
    pub fn permit(&self) -> SemaphorePermit<'_, Self> {
        Lock::guard(self)
    }

    /// Maximum number of simultaneous holders.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of holders right now.
    pub fn in_use(&self) -> usize {
        self.count.with(|c| *c)
    }
}

impl fmt::Debug for BlockingSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingSemaphore")
            .field("in_use", &self.in_use())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Lock for BlockingSemaphore {
    fn acquire(&self) {
        BlockingSemaphore::acquire(self);
    }

    fn release(&self) {
        BlockingSemaphore::release(self);
    }

    fn try_acquire(&self) -> bool {
        BlockingSemaphore::try_acquire(self)
    }
}

impl Semaphore for BlockingSemaphore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn in_use(&self) -> usize {
        BlockingSemaphore::in_use(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_admits_up_to_capacity() {
        let sem = SpinSemaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        assert_eq!(sem.in_use(), 2);
        sem.release();
        assert!(sem.try_acquire());
    }

    #[test]
    fn failed_try_acquire_leaves_no_trace() {
        let sem = SpinSemaphore::new(1);
        let _p = sem.permit();
        for _ in 0..10 {
            assert!(!sem.try_acquire());
        }
        assert_eq!(sem.in_use(), 1);
    }

    #[test]
    fn blocking_permit_releases_on_drop() {
        let sem = BlockingSemaphore::new(1);
        {
            let _p = sem.permit();
            assert!(!sem.try_acquire());
        }
        assert_eq!(sem.in_use(), 0);
        assert!(sem.try_acquire());
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_panics() {
        let _ = SpinSemaphore::new(0);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_blocking_panics() {
        let _ = BlockingSemaphore::new(0);
    }

    #[test]
    fn trait_reports_capacity() {
        fn cap(s: &impl Semaphore) -> usize {
            s.capacity()
        }
        assert_eq!(cap(&SpinSemaphore::new(3)), 3);
        assert_eq!(cap(&BlockingSemaphore::new(4)), 4);
    }
}

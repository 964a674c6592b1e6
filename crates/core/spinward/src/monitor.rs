//! Mutual exclusion plus condition-based suspension.
//!
//! A [`Monitor`] couples an OS mutex with a condition variable and the
//! predicate state they protect. [`MonitorGuard::wait`] can return without a
//! matching notify and without the predicate having changed, so callers loop
//! through [`MonitorGuard::wait_until`] (or re-check by hand).
//!
//! A poisoned mutex means a thread panicked while holding the predicate
//! state. The state cannot be trusted after that, so every monitor operation
//! that observes poisoning is an invariant violation: it logs at fatal level
//! and aborts the process.

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync::{Condvar, LockResult, Mutex, MutexGuard};

use crate::lock::{Lock, LockGuard};

/// Predicate state guarded by a mutex, with a condition variable to wait on.
pub struct Monitor<T> {
    state: Mutex<T>,
    cond: Condvar,
}

impl<T> Monitor<T> {
    /// Creates a monitor around `value`.
    pub const fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            cond: Condvar::new(),
        }
    }

    /// Locks the monitor. The mutex is held until the guard is dropped.
    pub fn enter(&self) -> MonitorGuard<'_, T> {
        MonitorGuard {
            monitor: self,
            inner: unpoisoned(self.state.lock()),
        }
    }

    /// Wakes at least one waiter, if any.
    pub fn notify_one(&self) {
        self.cond.notify_one();
    }

    /// Wakes every waiter. They re-acquire the mutex one at a time, in no
    /// particular order.
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }

    /// Runs `f` with the monitor entered.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.enter())
    }

    /// Returns a mutable reference to the state; no locking is needed since
    /// the borrow is exclusive.
    pub fn get_mut(&mut self) -> &mut T {
        unpoisoned(self.state.get_mut())
    }

    /// Tears the monitor down and returns its state.
    pub fn into_inner(self) -> T {
        unpoisoned(self.state.into_inner())
    }
}

impl<T: Default> Default for Monitor<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Monitor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Monitor");
        match self.state.try_lock() {
            Ok(state) => d.field("state", &&*state),
            Err(_) => d.field("state", &format_args!("<locked>")),
        };
        d.finish_non_exhaustive()
    }
}

#[cold]
fn poisoned() -> ! {
    crate::invariant::invariant_violation(format_args!(
        "monitor mutex poisoned: a holder panicked"
    ))
}

fn unpoisoned<G>(result: LockResult<G>) -> G {
    match result {
        Ok(guard) => guard,
        Err(_) => poisoned(),
    }
}

/// An entered [`Monitor`]. Dereferences to the predicate state.
#[must_use = "if unused the monitor is exited immediately"]
pub struct MonitorGuard<'a, T> {
    monitor: &'a Monitor<T>,
    inner: MutexGuard<'a, T>,
}

impl<'a, T> MonitorGuard<'a, T> {
    /// Releases the mutex, suspends until woken, and re-acquires the mutex.
    ///
    /// May return spuriously: nothing about the state is implied.
    pub fn wait(self) -> Self {
        let monitor = self.monitor;
        Self {
            monitor,
            inner: unpoisoned(monitor.cond.wait(self.inner)),
        }
    }

    /// Waits until `pred` holds, re-checking after every wake.
    pub fn wait_until(mut self, mut pred: impl FnMut(&T) -> bool) -> Self {
        while !pred(&self.inner) {
            self = self.wait();
        }
        self
    }
}

impl<T> Deref for MonitorGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MonitorGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

// ---------------------------------------------------------------------------
// MonitorLock
// ---------------------------------------------------------------------------

/// A blocking mutex built on a [`Monitor`]: waiters sleep instead of spinning.
#[derive(Default)]
pub struct MonitorLock {
    locked: Monitor<bool>,
}

impl MonitorLock {
    /// Creates an unlocked lock.
    pub const fn new() -> Self {
        Self {
            locked: Monitor::new(false),
        }
    }

    /// Blocks until the lock is free, then takes it.
    pub fn acquire(&self) {
        let mut locked = self.locked.enter().wait_until(|held| !*held);
        *locked = true;
    }

    /// Takes the lock if it is free.
    pub fn try_acquire(&self) -> bool {
        self.locked.with(|held| !core::mem::replace(held, true))
    }

    /// Releases the lock and wakes one waiter.
    pub fn release(&self) {
        self.locked.with(|held| {
            crate::sw_invariant!(*held, "release of an unlocked monitor lock");
            *held = false;
        });
        self.locked.notify_one();
    }

    /// Returns `true` if some thread holds the lock (racy snapshot).
    pub fn is_locked(&self) -> bool {
        self.locked.with(|held| *held)
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    pub fn lock(&self) -> LockGuard<'_, Self> {
        Lock::guard(self)
    }
}

impl fmt::Debug for MonitorLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Lock for MonitorLock {
    fn acquire(&self) {
        MonitorLock::acquire(self);
    }

    fn release(&self) {
        MonitorLock::release(self);
    }

    fn try_acquire(&self) -> bool {
        MonitorLock::try_acquire(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn with_mutates_state() {
        let m = Monitor::new(1);
        m.with(|v| *v += 1);
        assert_eq!(*m.enter(), 2);
        assert_eq!(m.into_inner(), 2);
    }

    #[test]
    fn wait_until_returns_immediately_when_true() {
        let m = Monitor::new(true);
        let g = m.enter().wait_until(|ready| *ready);
        assert!(*g);
    }

    #[test]
    fn wait_until_sees_update_from_other_thread() {
        let m = Arc::new(Monitor::new(0u32));
        let setter = {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                m.with(|v| *v = 7);
                m.notify_all();
            })
        };
        let g = m.enter().wait_until(|v| *v == 7);
        assert_eq!(*g, 7);
        drop(g);
        setter.join().unwrap();
    }

    #[test]
    fn get_mut_bypasses_the_mutex() {
        let mut m = Monitor::new(vec![1]);
        m.get_mut().push(2);
        let held = m.enter();
        assert_eq!(*held, [1, 2]);
        drop(held);
        assert_eq!(m.into_inner(), [1, 2]);
    }

    #[test]
    fn monitor_lock_excludes() {
        let lock = MonitorLock::new();
        let guard = lock.lock();
        assert!(!lock.try_acquire());
        drop(guard);
        assert!(lock.try_acquire());
        lock.release();
        assert!(!lock.is_locked());
    }
}

//! Spin-based mutual exclusion.
//!
//! [`Spinlock`] is the raw lock: one [`AtomicCell`] and no protected data.
//! [`SpinMutex`] pairs it with the value it guards.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::atomic::{AtomicCell, UNLOCKED};
use crate::backoff::{Backoff, UnknownName};
use crate::lock::{Lock, LockGuard};

/// How [`Spinlock::acquire`] polls a held lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SpinPolicy {
    /// Retry `test_and_set` on every poll.
    TestAndSet,
    /// Read until the lock looks free, then make one `test_and_set` attempt.
    #[default]
    TestAndTestAndSet,
}

impl SpinPolicy {
    /// Both policies.
    pub const ALL: [SpinPolicy; 2] = [Self::TestAndSet, Self::TestAndTestAndSet];

    /// Returns the kebab-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::TestAndSet => "test-and-set",
            Self::TestAndTestAndSet => "test-and-test-and-set",
        }
    }
}

impl core::str::FromStr for SpinPolicy {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tas" => Ok(Self::TestAndSet),
            "ttas" => Ok(Self::TestAndTestAndSet),
            _ => Self::ALL
                .into_iter()
                .find(|p| p.name() == s)
                .ok_or(UnknownName),
        }
    }
}

/// A busy-waiting mutual exclusion lock.
///
/// No fairness: a waiter can be overtaken indefinitely. Const-constructable
/// so it can be placed in `static` items.
pub struct Spinlock {
    cell: AtomicCell,
    policy: SpinPolicy,
    backoff: Backoff,
    #[cfg(feature = "lockdep")]
    name: Option<&'static str>,
}

/// Guard returned by [`Spinlock::lock`].
pub type SpinlockGuard<'a> = LockGuard<'a, Spinlock>;

impl Spinlock {
    /// Creates an unlocked test-and-test-and-set lock with no backoff.
    pub const fn new() -> Self {
        Self::with_policy(SpinPolicy::TestAndTestAndSet, Backoff::None)
    }

    /// Creates an unlocked lock with the given polling policy and backoff.
    pub const fn with_policy(policy: SpinPolicy, backoff: Backoff) -> Self {
        Self {
            cell: AtomicCell::unlocked(),
            policy,
            backoff,
            #[cfg(feature = "lockdep")]
            name: None,
        }
    }

    /// Creates an unlocked lock with a name for lockdep diagnostics.
    ///
    /// Only named locks take part in lock-order tracking. Without the
    /// `lockdep` feature the name is discarded.
    pub const fn named(name: &'static str) -> Self {
        #[cfg(not(feature = "lockdep"))]
        let _ = name;
        Self {
            cell: AtomicCell::unlocked(),
            policy: SpinPolicy::TestAndTestAndSet,
            backoff: Backoff::None,
            #[cfg(feature = "lockdep")]
            name: Some(name),
        }
    }

    /// Acquires the lock, spinning until it becomes available.
    pub fn acquire(&self) {
        let mut backoff = self.backoff.waiter();
        match self.policy {
            SpinPolicy::TestAndSet => {
                while self.cell.test_and_set() != UNLOCKED {
                    backoff.snooze();
                }
            }
            SpinPolicy::TestAndTestAndSet => loop {
                // Fast path: try to acquire directly.
                if self.cell.test_and_set() == UNLOCKED {
                    break;
                }
                // Spin on a plain read (shared cache line) until it looks free.
                while self.cell.is_set() {
                    backoff.snooze();
                }
            },
        }
        self.lockdep_acquired();
    }

    /// Makes one `test_and_set` attempt.
    pub fn try_acquire(&self) -> bool {
        let acquired = self.cell.test_and_set() == UNLOCKED;
        if acquired {
            self.lockdep_acquired();
        }
        acquired
    }

    /// Releases the lock.
    ///
    /// Must only be called by the current holder.
    pub fn release(&self) {
        crate::sw_invariant!(self.cell.is_set(), "release of an unlocked spinlock");
        self.lockdep_released();
        self.cell.clear();
    }

    /// Returns `true` if some thread holds the lock.
    ///
    /// A racy snapshot, suitable for heuristics and diagnostics only.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.cell.is_set()
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    pub fn lock(&self) -> SpinlockGuard<'_> {
        Lock::guard(self)
    }

    /// Returns the polling policy.
    pub const fn policy(&self) -> SpinPolicy {
        self.policy
    }

    /// Returns the backoff applied between polls.
    pub const fn backoff(&self) -> Backoff {
        self.backoff
    }

    #[cfg(feature = "lockdep")]
    fn lockdep_acquired(&self) {
        if let Some(name) = self.name {
            let class = crate::lockdep::get_or_register(
                core::ptr::from_ref(self) as usize,
                name,
                crate::lock::LockKind::Spin,
            );
            crate::lockdep::lock_acquired(class, || self.cell.clear());
        }
    }

    #[cfg(feature = "lockdep")]
    fn lockdep_released(&self) {
        if self.name.is_some() {
            crate::lockdep::lock_released(crate::lockdep::lookup(
                core::ptr::from_ref(self) as usize,
            ));
        }
    }

    #[cfg(not(feature = "lockdep"))]
    #[inline(always)]
    fn lockdep_acquired(&self) {}

    #[cfg(not(feature = "lockdep"))]
    #[inline(always)]
    fn lockdep_released(&self) {}
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Spinlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spinlock")
            .field("locked", &self.is_locked())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Lock for Spinlock {
    fn acquire(&self) {
        Spinlock::acquire(self);
    }

    fn release(&self) {
        Spinlock::release(self);
    }

    fn try_acquire(&self) -> bool {
        Spinlock::try_acquire(self)
    }
}

// ---------------------------------------------------------------------------
// SpinMutex
// ---------------------------------------------------------------------------

/// A [`Spinlock`] that owns the data it protects.
pub struct SpinMutex<T> {
    raw: Spinlock,
    data: UnsafeCell<T>,
}

// SAFETY: The SpinMutex ensures exclusive access to `T` via the raw lock.
// `T: Send` is required because the data may be accessed from different threads.
unsafe impl<T: Send> Send for SpinMutex<T> {}
unsafe impl<T: Send> Sync for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    /// Creates a new unlocked `SpinMutex` wrapping `value`.
    pub const fn new(value: T) -> Self {
        Self {
            raw: Spinlock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Creates a new unlocked `SpinMutex` with a lockdep name.
    pub const fn named(name: &'static str, value: T) -> Self {
        Self {
            raw: Spinlock::named(name),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, spinning until it becomes available.
    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        self.raw.acquire();
        SpinMutexGuard { mutex: self }
    }

    /// Attempts to acquire the lock without spinning.
    pub fn try_lock(&self) -> Option<SpinMutexGuard<'_, T>> {
        self.raw
            .try_acquire()
            .then(|| SpinMutexGuard { mutex: self })
    }

    /// Returns a mutable reference to the data; no locking is needed since
    /// the borrow is exclusive.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the mutex and returns the data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for SpinMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for SpinMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinMutex")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

/// RAII guard that releases the [`SpinMutex`] when dropped.
#[must_use = "if unused the SpinMutex is released immediately"]
pub struct SpinMutexGuard<'a, T> {
    mutex: &'a SpinMutex<T>,
}

impl<T> Deref for SpinMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for SpinMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for SpinMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.raw.release();
    }
}

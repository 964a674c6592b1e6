//! Recursive mutual exclusion.
//!
//! A [`ReentrantLock`] remembers which thread holds it and how many times.
//! The owner re-acquires without touching the inner [`Spinlock`]; the lock
//! is released for real only when the depth returns to zero.

use core::fmt;
use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::atomic::AtomicCell;
use crate::backoff::Backoff;
use crate::lock::{Lock, LockGuard};
use crate::spinlock::{SpinPolicy, Spinlock};

/// Process-unique identity of a thread, as recorded by [`ReentrantLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(NonZeroUsize);

/// Raw owner value meaning "no owner".
const NO_OWNER: usize = 0;

static NEXT_OWNER: AtomicUsize = AtomicUsize::new(1);

std::thread_local! {
    static CURRENT: OwnerId = OwnerId::fresh();
}

impl OwnerId {
    /// Returns the calling thread's id, assigning one on first use.
    pub fn current() -> Self {
        CURRENT.with(|id| *id)
    }

    fn fresh() -> Self {
        let raw = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        match NonZeroUsize::new(raw) {
            Some(id) => Self(id),
            None => crate::invariant::invariant_violation(format_args!("owner ids exhausted")),
        }
    }

    /// Reinterprets a raw value; `None` for the "no owner" value 0.
    pub const fn from_raw(raw: usize) -> Option<Self> {
        match NonZeroUsize::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the raw value.
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A lock its owner may acquire again while holding it.
pub struct ReentrantLock {
    inner: Spinlock,
    owner: AtomicCell,
    depth: AtomicCell,
    #[cfg(feature = "lockdep")]
    name: Option<&'static str>,
}

/// Guard returned by [`ReentrantLock::lock`].
pub type ReentrantGuard<'a> = LockGuard<'a, ReentrantLock>;

impl ReentrantLock {
    /// Creates an unowned lock.
    pub const fn new() -> Self {
        Self::with_backoff(Backoff::None)
    }

    /// Creates an unowned lock whose inner spinlock waits with `backoff`.
    pub const fn with_backoff(backoff: Backoff) -> Self {
        Self {
            inner: Spinlock::with_policy(SpinPolicy::TestAndTestAndSet, backoff),
            owner: AtomicCell::new(NO_OWNER),
            depth: AtomicCell::new(0),
            #[cfg(feature = "lockdep")]
            name: None,
        }
    }

    /// Creates an unowned lock tracked by lockdep under `name`.
    pub const fn named(name: &'static str) -> Self {
        #[cfg(not(feature = "lockdep"))]
        let _ = name;
        Self {
            #[cfg(feature = "lockdep")]
            name: Some(name),
            ..Self::new()
        }
    }

    /// Acquires the lock for `id`, or deepens the hold if `id` already owns it.
    pub fn acquire(&self, id: OwnerId) {
        if self.owned_by(id) {
            self.depth.increment();
            return;
        }
        self.inner.acquire();
        self.take(id);
    }

    /// Like [`ReentrantLock::acquire`], but gives up instead of spinning.
    pub fn try_acquire(&self, id: OwnerId) -> bool {
        if self.owned_by(id) {
            self.depth.increment();
            return true;
        }
        if !self.inner.try_acquire() {
            return false;
        }
        self.take(id);
        true
    }

    // Only `id`'s own thread ever stores `id` into `owner`, and it clears the
    // field before releasing the inner lock. Reading back our own id therefore
    // means we hold the lock.
    fn owned_by(&self, id: OwnerId) -> bool {
        self.owner.peek() == id.get()
    }

    fn take(&self, id: OwnerId) {
        crate::sw_invariant!(
            self.depth.load() == 0,
            "reentrant lock taken with depth {}",
            self.depth.load()
        );
        self.owner.store_release(id.get());
        self.depth.store_release(1);
        self.lockdep_acquired();
    }

    /// Undoes one acquisition; the outermost one frees the lock.
    ///
    /// Must be called by the owner.
    pub fn release(&self) {
        crate::sw_invariant!(
            self.depth.load() > 0,
            "release of an unheld reentrant lock"
        );
        if self.depth.decrement() == 0 {
            self.lockdep_released();
            self.owner.store_release(NO_OWNER);
            self.inner.release();
        }
    }

    /// Checked form of [`ReentrantLock::release`]: `id` must be the owner.
    pub fn release_as(&self, id: OwnerId) {
        crate::sw_invariant!(
            self.owned_by(id),
            "reentrant lock released by {} but owned by {:?}",
            id,
            self.owner()
        );
        self.release();
    }

    /// Acquires for the calling thread; released when the guard drops.
    pub fn lock(&self) -> ReentrantGuard<'_> {
        Lock::guard(self)
    }

    /// The current owner (racy snapshot).
    pub fn owner(&self) -> Option<OwnerId> {
        OwnerId::from_raw(self.owner.peek())
    }

    /// The current hold depth (racy snapshot, exact for the owner).
    pub fn depth(&self) -> usize {
        self.depth.peek()
    }

    /// `true` if `id` holds the lock.
    pub fn is_held_by(&self, id: OwnerId) -> bool {
        self.owned_by(id)
    }

    #[cfg(feature = "lockdep")]
    fn lockdep_acquired(&self) {
        if let Some(name) = self.name {
            let class = crate::lockdep::get_or_register(
                core::ptr::from_ref(self) as usize,
                name,
                crate::lock::LockKind::Reentrant,
            );
            crate::lockdep::lock_acquired(class, || {
                self.depth.store_release(0);
                self.owner.store_release(NO_OWNER);
                self.inner.release();
            });
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

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("owner", &self.owner())
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

impl Lock for ReentrantLock {
    fn acquire(&self) {
        ReentrantLock::acquire(self, OwnerId::current());
    }

    fn release(&self) {
        self.release_as(OwnerId::current());
    }

    fn try_acquire(&self) -> bool {
        ReentrantLock::try_acquire(self, OwnerId::current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn owner_ids_are_per_thread() {
        let here = OwnerId::current();
        assert_eq!(here, OwnerId::current());
        let there = thread::spawn(OwnerId::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn raw_zero_is_no_owner() {
        assert_eq!(OwnerId::from_raw(0), None);
        let id = OwnerId::current();
        assert_eq!(OwnerId::from_raw(id.get()), Some(id));
    }

    #[test]
    fn nested_acquire_restores_depth() {
        let lock = ReentrantLock::new();
        let me = OwnerId::current();
        for _ in 0..10 {
            lock.acquire(me);
        }
        assert_eq!(lock.depth(), 10);
        assert_eq!(lock.owner(), Some(me));
        for _ in 0..10 {
            lock.release_as(me);
        }
        assert_eq!(lock.depth(), 0);
        assert_eq!(lock.owner(), None);
    }

    #[test]
    fn other_thread_is_refused_while_held() {
        let lock = ReentrantLock::new();
        let _outer = lock.lock();
        let _inner = lock.lock();
        thread::scope(|s| {
            let refused = s.spawn(|| !Lock::try_acquire(&lock)).join().unwrap();
            assert!(refused);
        });
        assert!(lock.is_held_by(OwnerId::current()));
    }

    #[test]
    fn released_lock_passes_to_other_thread() {
        let lock = ReentrantLock::new();
        drop(lock.lock());
        thread::scope(|s| {
            s.spawn(|| {
                let _g = lock.lock();
                assert_eq!(lock.depth(), 1);
            });
        });
        assert_eq!(lock.owner(), None);
    }
}

//! Spinning reader-writer lock with writer priority.
//!
//! State is two counters and an inner [`Spinlock`]:
//!
//! - `readers`: readers holding or attempting shared access.
//! - `writers`: writers that have registered intent, holding or waiting.
//!
//! A writer registers first and then waits for `readers` to drain, so once a
//! writer is pending no new reader gets in. Readers admit optimistically:
//! increment, then re-check `writers`, rolling back if a writer registered in
//! between. Both sides "increment mine, then read yours" with sequentially
//! consistent operations, so at least one of a racing reader and writer sees
//! the other.
//!
//! Under a steady stream of writers, readers can starve.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use crate::atomic::AtomicCell;
use crate::backoff::Backoff;
use crate::lock::{Lock, LockGuard, SharedLock};
use crate::spinlock::{SpinPolicy, Spinlock};

/// A reader-writer lock with no protected data.
pub struct ReaderWriterLock {
    readers: AtomicCell,
    writers: AtomicCell,
    inner: Spinlock,
    backoff: Backoff,
    #[cfg(feature = "lockdep")]
    name: Option<&'static str>,
}

/// Guard for exclusive access, released on drop.
pub type WriteGuard<'a> = LockGuard<'a, ReaderWriterLock>;

impl ReaderWriterLock {
    /// Creates an unlocked reader-writer lock.
    pub const fn new() -> Self {
        Self::with_backoff(Backoff::None)
    }

    /// Creates an unlocked lock whose wait loops use `backoff`.
    pub const fn with_backoff(backoff: Backoff) -> Self {
        Self {
            readers: AtomicCell::new(0),
            writers: AtomicCell::new(0),
            inner: Spinlock::with_policy(SpinPolicy::TestAndTestAndSet, backoff),
            backoff,
            #[cfg(feature = "lockdep")]
            name: None,
        }
    }

    /// Creates an unlocked lock whose write side is tracked by lockdep.
    pub const fn named(name: &'static str) -> Self {
        #[cfg(not(feature = "lockdep"))]
        let _ = name;
        Self {
            #[cfg(feature = "lockdep")]
            name: Some(name),
            ..Self::new()
        }
    }

    /// Spins until no writer is pending, then takes shared access.
    pub fn acquire_read(&self) {
        let mut backoff = self.backoff.waiter();
        loop {
            while self.writers.load() > 0 {
                backoff.snooze();
            }
            if self.enter_read() {
                return;
            }
        }
    }

    /// Takes shared access if no writer is pending.
    pub fn try_acquire_read(&self) -> bool {
        self.writers.load() == 0 && self.enter_read()
    }

    fn enter_read(&self) -> bool {
        self.readers.increment();
        if self.writers.load() == 0 {
            return true;
        }
        // A writer registered in the window; let it through.
        self.readers.decrement();
        false
    }

    /// Gives back shared access.
    pub fn release_read(&self) {
        let prev = self.readers.fetch_sub(1);
        crate::sw_invariant!(prev > 0, "read release with no readers");
    }

    /// Registers as a pending writer, spins until readers drain, then takes
    /// exclusive access.
    pub fn acquire_write(&self) {
        self.writers.increment();
        let mut backoff = self.backoff.waiter();
        while self.readers.load() > 0 {
            backoff.snooze();
        }
        self.inner.acquire();
        self.lockdep_acquired();
    }

    /// Takes exclusive access if there are no readers and no writer holds it.
    pub fn try_acquire_write(&self) -> bool {
        self.writers.increment();
        if self.readers.load() == 0 && self.inner.try_acquire() {
            self.lockdep_acquired();
            return true;
        }
        self.writers.decrement();
        false
    }

    /// Gives back exclusive access.
    pub fn release_write(&self) {
        crate::sw_invariant!(
            self.writers.load() > 0,
            "write release with no registered writer"
        );
        self.lockdep_released();
        self.inner.release();
        self.writers.decrement();
    }

    /// Takes shared access; released when the guard drops.
    pub fn read(&self) -> ReadGuard<'_> {
        self.acquire_read();
        ReadGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Takes exclusive access; released when the guard drops.
    pub fn write(&self) -> WriteGuard<'_> {
        Lock::guard(self)
    }

    /// Readers holding or attempting shared access (racy snapshot).
    pub fn readers(&self) -> usize {
        self.readers.peek()
    }

    /// Writers holding or waiting for exclusive access (racy snapshot).
    pub fn writers_pending(&self) -> usize {
        self.writers.peek()
    }

    #[cfg(feature = "lockdep")]
    fn lockdep_acquired(&self) {
        if let Some(name) = self.name {
            let class = crate::lockdep::get_or_register(
                core::ptr::from_ref(self) as usize,
                name,
                crate::lock::LockKind::RwWrite,
            );
            crate::lockdep::lock_acquired(class, || {
                self.inner.release();
                self.writers.decrement();
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

impl Default for ReaderWriterLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReaderWriterLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderWriterLock")
            .field("readers", &self.readers())
            .field("writers_pending", &self.writers_pending())
            .finish_non_exhaustive()
    }
}

impl Lock for ReaderWriterLock {
    fn acquire(&self) {
        self.acquire_write();
    }

    fn release(&self) {
        self.release_write();
    }

    fn try_acquire(&self) -> bool {
        self.try_acquire_write()
    }
}

impl SharedLock for ReaderWriterLock {
    fn acquire_shared(&self) {
        self.acquire_read();
    }

    fn release_shared(&self) {
        self.release_read();
    }
}

/// Guard for shared access to a [`ReaderWriterLock`].
#[must_use = "if unused the read lock is released immediately"]
pub struct ReadGuard<'a> {
    lock: &'a ReaderWriterLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl fmt::Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RwLock<T>
// ---------------------------------------------------------------------------

/// A [`ReaderWriterLock`] that owns the data it protects.
pub struct RwLock<T> {
    raw: ReaderWriterLock,
    data: UnsafeCell<T>,
}

// SAFETY: The RwLock ensures that `T` is either accessed by multiple shared
// readers (requiring `T: Sync`) or by a single exclusive writer (requiring
// `T: Send`).
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    /// Creates a new unlocked `RwLock` wrapping `value`.
    pub const fn new(value: T) -> Self {
        Self {
            raw: ReaderWriterLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires shared access, spinning while a writer is pending.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.raw.acquire_read();
        RwLockReadGuard { lock: self }
    }

    /// Acquires exclusive access, spinning until readers and writers drain.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.raw.acquire_write();
        RwLockWriteGuard { lock: self }
    }

    /// Tries to acquire shared access without spinning.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.raw
            .try_acquire_read()
            .then(|| RwLockReadGuard { lock: self })
    }

    /// Tries to acquire exclusive access without spinning.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.raw
            .try_acquire_write()
            .then(|| RwLockWriteGuard { lock: self })
    }

    /// Returns a mutable reference to the data; the borrow is exclusive.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the lock and returns the data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

/// RAII guard for a shared read lock on an [`RwLock`].
#[must_use = "if unused the read lock is released immediately"]
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Read lock is held, so no writer can exist.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.release_read();
    }
}

/// RAII guard for an exclusive write lock on an [`RwLock`].
#[must_use = "if unused the write lock is released immediately"]
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Write lock is held, so no other reader or writer can exist.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Write lock is held, so no other reader or writer can exist.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_mut_and_into_inner() {
        let mut lock = RwLock::new(String::from("a"));
        lock.get_mut().push('b');
        assert_eq!(*lock.read(), "ab");
        assert_eq!(lock.into_inner(), "ab");
    }

    #[test]
    fn multiple_readers() {
        let lock = RwLock::new(42);
        let g1 = lock.read();
        let g2 = lock.read();
        assert_eq!(*g1, 42);
        assert_eq!(*g2, 42);
        assert_eq!(lock.raw.readers(), 2);
    }

    #[test]
    fn write_lock() {
        let lock = RwLock::new(0);
        {
            let mut guard = lock.write();
            *guard = 99;
        }
        assert_eq!(*lock.read(), 99);
    }

    #[test]
    fn try_write_fails_with_reader() {
        let lock = RwLock::new(10);
        let _reader = lock.read();
        assert!(lock.try_write().is_none());
        // The failed attempt must not leave a pending writer behind.
        assert_eq!(lock.raw.writers_pending(), 0);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn try_read_fails_with_writer() {
        let lock = RwLock::new(10);
        let _writer = lock.write();
        assert!(lock.try_read().is_none());
        assert_eq!(lock.raw.readers(), 0);
    }

    #[test]
    fn try_write_with_writer() {
        let lock = RwLock::new(0);
        let _writer = lock.write();
        assert!(lock.try_write().is_none());
        assert_eq!(lock.raw.writers_pending(), 1);
    }

    #[test]
    fn write_after_readers_dropped() {
        let lock = RwLock::new(0);
        {
            let _g1 = lock.read();
            let _g2 = lock.read();
        }
        *lock.write() = 42;
        assert_eq!(*lock.read(), 42);
    }

    #[test]
    fn pending_writer_blocks_new_readers() {
        let lock = ReaderWriterLock::new();
        let reader = lock.read();
        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                let _w = lock.write();
            });
            while lock.writers_pending() == 0 {
                std::hint::spin_loop();
            }
            assert!(!lock.try_acquire_read());
            drop(reader);
            writer.join().unwrap();
        });
        assert_eq!(lock.writers_pending(), 0);
        assert!(lock.try_acquire_read());
        lock.release_read();
    }

    #[test]
    fn shared_lock_trait_routes_to_read_side() {
        let lock = ReaderWriterLock::new();
        lock.acquire_shared();
        lock.acquire_shared();
        assert_eq!(lock.readers(), 2);
        assert!(!Lock::try_acquire(&lock));
        lock.release_shared();
        lock.release_shared();
        assert!(Lock::try_acquire(&lock));
        Lock::release(&lock);
    }
}

//! Synchronization primitives built on a single atomic word.
//!
//! Everything spin-based here reduces to [`AtomicCell`]: compare-and-swap,
//! test-and-set, fetch-and-add and an ordered clear. On top of it sit
//! [`Spinlock`], the first-come, first-served [`TicketLock`],
//! [`SpinSemaphore`], [`SpinBarrier`], [`ReaderWriterLock`] and
//! [`ReentrantLock`]. The blocking variants ([`BlockingSemaphore`],
//! [`BlockingBarrier`], [`MonitorLock`]) sleep on a [`Monitor`], the one
//! place where the OS mutex and condition variable are used.
//!
//! None of the raw primitives own data, so misuse (a release without a
//! matching acquire) cannot cause memory unsafety. It breaks the lock for
//! everyone else, and debug builds abort on it; see [`invariant`]. The
//! guard-returning methods make unmatched releases impossible and are the
//! preferred surface. [`SpinMutex`] and [`RwLock`] additionally own the
//! data they protect.
//!
//! Only [`TicketLock`] is fair, and no primitive supports timeouts or
//! cancellation.

pub mod atomic;
pub mod backoff;
pub mod barrier;
pub mod invariant;
pub mod lock;
#[cfg(feature = "lockdep")]
pub mod lockdep;
pub mod log;
pub mod monitor;
pub mod reentrant;
pub mod rwlock;
pub mod semaphore;
pub mod spinlock;
pub mod ticket;

pub use atomic::AtomicCell;
pub use backoff::{Backoff, BackoffWaiter, UnknownName};
pub use barrier::{BarrierWaitResult, BlockingBarrier, SpinBarrier};
pub use lock::{
    AnyBarrier, AnyLock, BarrierKind, Lock, LockGuard, LockKind, Rendezvous, SharedLock,
};
pub use monitor::{Monitor, MonitorGuard, MonitorLock};
pub use reentrant::{OwnerId, ReentrantGuard, ReentrantLock};
pub use rwlock::{
    ReadGuard, ReaderWriterLock, RwLock, RwLockReadGuard, RwLockWriteGuard, WriteGuard,
};
pub use semaphore::{BlockingSemaphore, Semaphore, SemaphorePermit, SpinSemaphore};
pub use spinlock::{SpinMutex, SpinMutexGuard, SpinPolicy, Spinlock, SpinlockGuard};
pub use ticket::{TicketGuard, TicketLock};

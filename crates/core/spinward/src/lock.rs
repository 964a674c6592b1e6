//! The closed set of lock flavors behind one acquire/release capability.
//!
//! Every mutual-exclusion or admission primitive in the crate implements
//! [`Lock`]. Code that wants to be generic over the flavor either takes
//! `&impl Lock` or holds an [`AnyLock`], built from a [`LockKind`] tag. The
//! barriers have no release step and are grouped under [`Rendezvous`] and
//! [`AnyBarrier`] instead.

use core::fmt;
use core::marker::PhantomData;
use core::str::FromStr;

use crate::backoff::{Backoff, UnknownName};
use crate::barrier::{BarrierWaitResult, BlockingBarrier, SpinBarrier};
use crate::monitor::MonitorLock;
use crate::reentrant::ReentrantLock;
use crate::rwlock::ReaderWriterLock;
use crate::semaphore::{BlockingSemaphore, SpinSemaphore};
use crate::spinlock::{SpinPolicy, Spinlock};
use crate::ticket::TicketLock;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Paired acquire/release entry points.
///
/// `release` must only follow a matching `acquire` (or successful
/// `try_acquire`) on the same thread; [`Lock::guard`] makes that structural.
pub trait Lock {
    /// Blocks until the caller is admitted.
    fn acquire(&self);

    /// Gives back one admission.
    fn release(&self);

    /// Makes one admission attempt without waiting.
    fn try_acquire(&self) -> bool;

    /// Acquires and returns a guard that releases on drop.
    fn guard(&self) -> LockGuard<'_, Self> {
        self.acquire();
        LockGuard::adopt(self)
    }

    /// Returns a guard if one admission attempt succeeds.
    fn try_guard(&self) -> Option<LockGuard<'_, Self>> {
        self.try_acquire().then(|| LockGuard::adopt(self))
    }
}

/// A [`Lock`] whose exclusive side is complemented by a shared side.
pub trait SharedLock: Lock {
    /// Blocks until shared access is granted.
    fn acquire_shared(&self);

    /// Gives back shared access.
    fn release_shared(&self);
}

/// A fixed-size rendezvous point.
pub trait Rendezvous {
    /// Blocks until every participant of the current generation has arrived.
    fn arrive_and_wait(&self) -> BarrierWaitResult;

    /// Number of arrivals that complete a generation.
    fn participants(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// RAII guard that calls [`Lock::release`] when dropped.
///
/// The guard is `!Send`: a reentrant lock identifies its owner by thread, so
/// the release must happen where the acquire did.
#[must_use = "if unused the lock is released immediately"]
pub struct LockGuard<'a, L: Lock + ?Sized> {
    lock: &'a L,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: Lock + ?Sized> LockGuard<'a, L> {
    /// Wraps a lock the caller already holds.
    pub(crate) fn adopt(lock: &'a L) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// The lock this guard releases.
    pub fn lock(&self) -> &'a L {
        self.lock
    }
}

impl<L: Lock + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl<L: Lock + ?Sized> fmt::Debug for LockGuard<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Lock kinds
// ---------------------------------------------------------------------------

/// Tag naming one lock flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum LockKind {
    /// [`Spinlock`] with test-and-test-and-set.
    Spin,
    /// [`Spinlock`] with a tight test-and-set loop.
    SpinTas,
    /// [`TicketLock`], admitting holders in arrival order.
    Ticket,
    /// [`SpinSemaphore`].
    Semaphore,
    /// [`BlockingSemaphore`].
    BlockingSemaphore,
    /// The exclusive side of [`ReaderWriterLock`].
    RwWrite,
    /// The shared side of [`ReaderWriterLock`].
    RwRead,
    /// [`ReentrantLock`], owned by the calling thread.
    Reentrant,
    /// [`MonitorLock`], the OS-backed blocking baseline.
    Monitor,
}

impl LockKind {
    /// All flavors, in declaration order.
    pub const ALL: [LockKind; 9] = [
        Self::Spin,
        Self::SpinTas,
        Self::Ticket,
        Self::Semaphore,
        Self::BlockingSemaphore,
        Self::RwWrite,
        Self::RwRead,
        Self::Reentrant,
        Self::Monitor,
    ];

    /// Returns the kebab-case name used on the command line and in config.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spin => "spin",
            Self::SpinTas => "spin-tas",
            Self::Ticket => "ticket",
            Self::Semaphore => "semaphore",
            Self::BlockingSemaphore => "blocking-semaphore",
            Self::RwWrite => "rw-write",
            Self::RwRead => "rw-read",
            Self::Reentrant => "reentrant",
            Self::Monitor => "monitor",
        }
    }

    /// `true` for flavors that admit more than one holder at a time.
    pub const fn is_shared(self) -> bool {
        matches!(
            self,
            Self::Semaphore | Self::BlockingSemaphore | Self::RwRead
        )
    }

    /// Builds the matching lock with the default backoff.
    ///
    /// `capacity` is used by the semaphore flavors and ignored otherwise.
    pub fn build(self, capacity: usize) -> AnyLock {
        self.build_with(capacity, Backoff::None)
    }

    /// Builds the matching lock; spin flavors use `backoff` in their wait
    /// loops.
    pub fn build_with(self, capacity: usize, backoff: Backoff) -> AnyLock {
        match self {
            Self::Spin => {
                AnyLock::Spin(Spinlock::with_policy(SpinPolicy::TestAndTestAndSet, backoff))
            }
            Self::SpinTas => AnyLock::Spin(Spinlock::with_policy(SpinPolicy::TestAndSet, backoff)),
            Self::Ticket => AnyLock::Ticket(TicketLock::with_backoff(backoff)),
            Self::Semaphore => AnyLock::Semaphore(SpinSemaphore::with_backoff(capacity, backoff)),
            Self::BlockingSemaphore => AnyLock::BlockingSemaphore(BlockingSemaphore::new(capacity)),
            Self::RwWrite => AnyLock::RwWrite(ReaderWriterLock::with_backoff(backoff)),
            Self::RwRead => AnyLock::RwRead(ReaderWriterLock::with_backoff(backoff)),
            Self::Reentrant => AnyLock::Reentrant(ReentrantLock::with_backoff(backoff)),
            Self::Monitor => AnyLock::Monitor(MonitorLock::new()),
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LockKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or(UnknownName)
    }
}

/// One lock of any flavor.
#[derive(Debug)]
pub enum AnyLock {
    /// A spinlock under either policy.
    Spin(Spinlock),
    /// A first-come, first-served spinlock.
    Ticket(TicketLock),
    /// A spin-based counting semaphore.
    Semaphore(SpinSemaphore),
    /// A monitor-based counting semaphore.
    BlockingSemaphore(BlockingSemaphore),
    /// A reader-writer lock used through its exclusive side.
    RwWrite(ReaderWriterLock),
    /// A reader-writer lock used through its shared side.
    RwRead(ReaderWriterLock),
    /// A reentrant lock.
    Reentrant(ReentrantLock),
    /// A monitor-based mutex.
    Monitor(MonitorLock),
}

impl AnyLock {
    /// Returns the tag this lock was built from.
    pub fn kind(&self) -> LockKind {
        match self {
            Self::Spin(l) => match l.policy() {
                SpinPolicy::TestAndSet => LockKind::SpinTas,
                SpinPolicy::TestAndTestAndSet => LockKind::Spin,
            },
            Self::Ticket(_) => LockKind::Ticket,
            Self::Semaphore(_) => LockKind::Semaphore,
            Self::BlockingSemaphore(_) => LockKind::BlockingSemaphore,
            Self::RwWrite(_) => LockKind::RwWrite,
            Self::RwRead(_) => LockKind::RwRead,
            Self::Reentrant(_) => LockKind::Reentrant,
            Self::Monitor(_) => LockKind::Monitor,
        }
    }

    /// How many holders may be admitted at once.
    pub fn capacity(&self) -> usize {
        match self {
            Self::Semaphore(s) => s.capacity(),
            Self::BlockingSemaphore(s) => s.capacity(),
            Self::RwRead(_) => usize::MAX,
            _ => 1,
        }
    }
}

impl Lock for AnyLock {
    fn acquire(&self) {
        match self {
            Self::Spin(l) => l.acquire(),
            Self::Ticket(l) => l.acquire(),
            Self::Semaphore(l) => l.acquire(),
            Self::BlockingSemaphore(l) => l.acquire(),
            Self::RwWrite(l) => l.acquire_write(),
            Self::RwRead(l) => l.acquire_read(),
            Self::Reentrant(l) => Lock::acquire(l),
            Self::Monitor(l) => l.acquire(),
        }
    }

    fn release(&self) {
        match self {
            Self::Spin(l) => l.release(),
            Self::Ticket(l) => l.release(),
            Self::Semaphore(l) => l.release(),
            Self::BlockingSemaphore(l) => l.release(),
            Self::RwWrite(l) => l.release_write(),
            Self::RwRead(l) => l.release_read(),
            Self::Reentrant(l) => Lock::release(l),
            Self::Monitor(l) => l.release(),
        }
    }

    fn try_acquire(&self) -> bool {
        match self {
            Self::Spin(l) => l.try_acquire(),
            Self::Ticket(l) => l.try_acquire(),
            Self::Semaphore(l) => l.try_acquire(),
            Self::BlockingSemaphore(l) => l.try_acquire(),
            Self::RwWrite(l) => l.try_acquire_write(),
            Self::RwRead(l) => l.try_acquire_read(),
            Self::Reentrant(l) => Lock::try_acquire(l),
            Self::Monitor(l) => l.try_acquire(),
        }
    }
}

// ---------------------------------------------------------------------------
// Barrier kinds
// ---------------------------------------------------------------------------

/// Tag naming one barrier flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum BarrierKind {
    /// [`SpinBarrier`].
    #[default]
    Spin,
    /// [`BlockingBarrier`].
    Blocking,
}

impl BarrierKind {
    /// Both flavors.
    pub const ALL: [BarrierKind; 2] = [Self::Spin, Self::Blocking];

    /// Returns the kebab-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spin => "spin",
            Self::Blocking => "blocking",
        }
    }

    /// Builds a barrier for `target` participants.
    pub fn build(self, target: usize, backoff: Backoff) -> AnyBarrier {
        match self {
            Self::Spin => AnyBarrier::Spin(SpinBarrier::with_backoff(target, backoff)),
            Self::Blocking => AnyBarrier::Blocking(BlockingBarrier::new(target)),
        }
    }
}

impl fmt::Display for BarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BarrierKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or(UnknownName)
    }
}

/// One barrier of either flavor.
#[derive(Debug)]
pub enum AnyBarrier {
    /// Busy-waiting barrier.
    Spin(SpinBarrier),
    /// Monitor-based barrier.
    Blocking(BlockingBarrier),
}

impl AnyBarrier {
    /// Returns the tag this barrier was built from.
    pub fn kind(&self) -> BarrierKind {
        match self {
            Self::Spin(_) => BarrierKind::Spin,
            Self::Blocking(_) => BarrierKind::Blocking,
        }
    }

    /// Number of completed generations.
    pub fn generation(&self) -> usize {
        match self {
            Self::Spin(b) => b.generation(),
            Self::Blocking(b) => b.generation(),
        }
    }
}

impl Rendezvous for AnyBarrier {
    fn arrive_and_wait(&self) -> BarrierWaitResult {
        match self {
            Self::Spin(b) => b.arrive_and_wait(),
            Self::Blocking(b) => b.arrive_and_wait(),
        }
    }

    fn participants(&self) -> usize {
        match self {
            Self::Spin(b) => b.target(),
            Self::Blocking(b) => b.target(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in LockKind::ALL {
            assert_eq!(kind.name().parse::<LockKind>(), Ok(kind));
        }
        for kind in BarrierKind::ALL {
            assert_eq!(kind.name().parse::<BarrierKind>(), Ok(kind));
        }
        assert!("mcs".parse::<LockKind>().is_err());
    }

    #[test]
    fn built_lock_reports_its_kind() {
        for kind in LockKind::ALL {
            assert_eq!(kind.build(2).kind(), kind);
        }
    }

    #[test]
    fn exclusive_kinds_refuse_second_holder() {
        for kind in LockKind::ALL.into_iter().filter(|k| !k.is_shared()) {
            let lock = kind.build(1);
            let _g = lock.guard();
            if kind == LockKind::Reentrant {
                // Same thread: admitted again by design.
                assert!(lock.try_acquire());
                lock.release();
            } else {
                assert!(lock.try_guard().is_none(), "{kind} admitted twice");
            }
        }
    }

    #[test]
    fn semaphore_kinds_admit_capacity_holders() {
        for kind in [LockKind::Semaphore, LockKind::BlockingSemaphore] {
            let lock = kind.build(2);
            assert_eq!(lock.capacity(), 2);
            let a = lock.try_guard();
            let b = lock.try_guard();
            assert!(a.is_some() && b.is_some());
            assert!(lock.try_guard().is_none());
        }
    }

    #[test]
    fn rw_read_admits_many() {
        let lock = LockKind::RwRead.build(0);
        let _a = lock.guard();
        let _b = lock.guard();
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn barrier_of_one_never_waits() {
        for kind in BarrierKind::ALL {
            let b = kind.build(1, Backoff::None);
            assert!(b.arrive_and_wait().is_leader());
            assert!(b.arrive_and_wait().is_leader());
            assert_eq!(b.generation(), 2);
            assert_eq!(b.participants(), 1);
        }
    }
}

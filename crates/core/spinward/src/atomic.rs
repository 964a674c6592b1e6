//! The single atomic word every spin-based primitive is built on.
//!
//! [`AtomicCell`] wraps one `usize` and exposes exactly the read-modify-write
//! operations the locks need: compare-and-swap, test-and-set, fetch-and-add,
//! and an ordered clear. Orderings are fixed per operation so callers cannot
//! pick a weaker one by accident:
//!
//! | Operation | Ordering |
//! |---|---|
//! | `test_and_set` | `Acquire` |
//! | `compare_and_swap` | `AcqRel` on success, `Acquire` on failure |
//! | `clear`, `store_release` | `Release` |
//! | `fetch_add`, `fetch_sub`, `load` | `SeqCst` |
//! | `peek` | `Relaxed` (non-synchronizing poll) |
//!
//! Counter operations are sequentially consistent. That subsumes the
//! acquire/release contract and gives the reader-writer handshake a single
//! total order between "increment mine, then read yours" on both sides.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Value of a clear cell.
pub const UNLOCKED: usize = 0;

/// Value written by [`AtomicCell::test_and_set`].
pub const LOCKED: usize = 1;

/// A single atomic word, padded to its own cache line.
pub struct AtomicCell {
    word: CachePadded<AtomicUsize>,
}

impl AtomicCell {
    /// Creates a cell holding `value`.
    pub const fn new(value: usize) -> Self {
        Self {
            word: CachePadded::new(AtomicUsize::new(value)),
        }
    }

    /// Creates a cell holding [`UNLOCKED`].
    pub const fn unlocked() -> Self {
        Self::new(UNLOCKED)
    }

    /// Replaces the value with `new` iff it currently equals `expected`.
    ///
    /// Returns whether the swap happened. A failed swap writes nothing.
    #[inline]
    pub fn compare_and_swap(&self, expected: usize, new: usize) -> bool {
        self.word
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Sets the cell to [`LOCKED`] and returns the value held just before.
    #[inline]
    pub fn test_and_set(&self) -> usize {
        self.word.swap(LOCKED, Ordering::Acquire)
    }

    /// Resets the cell to [`UNLOCKED`] with release ordering.
    #[inline]
    pub fn clear(&self) {
        self.word.store(UNLOCKED, Ordering::Release);
    }

    /// Stores `value` with release ordering.
    #[inline]
    pub fn store_release(&self, value: usize) {
        self.word.store(value, Ordering::Release);
    }

    /// Sequentially consistent load.
    #[inline]
    pub fn load(&self) -> usize {
        self.word.load(Ordering::SeqCst)
    }

    /// Relaxed load.
    ///
    /// Only valid as a fast-path poll before an atomic check (the first
    /// "test" of test-and-test-and-set). It never establishes ordering.
    #[inline]
    pub fn peek(&self) -> usize {
        self.word.load(Ordering::Relaxed)
    }

    /// Returns `true` if the cell currently holds anything but [`UNLOCKED`].
    #[inline]
    pub fn is_set(&self) -> bool {
        self.peek() != UNLOCKED
    }

    /// Adds `n` and returns the previous value.
    #[inline]
    pub fn fetch_add(&self, n: usize) -> usize {
        self.word.fetch_add(n, Ordering::SeqCst)
    }

    /// Subtracts `n` and returns the previous value.
    #[inline]
    pub fn fetch_sub(&self, n: usize) -> usize {
        self.word.fetch_sub(n, Ordering::SeqCst)
    }

    /// Adds one and returns the new value.
    #[inline]
    pub fn increment(&self) -> usize {
        self.fetch_add(1).wrapping_add(1)
    }

    /// Subtracts one and returns the new value.
    #[inline]
    pub fn decrement(&self) -> usize {
        self.fetch_sub(1).wrapping_sub(1)
    }
}

impl Default for AtomicCell {
    fn default() -> Self {
        Self::unlocked()
    }
}

impl fmt::Debug for AtomicCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCell").field(&self.peek()).finish()
    }
}

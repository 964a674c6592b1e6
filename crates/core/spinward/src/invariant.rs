//! Abort-on-breach checks for caller misuse.
//!
//! Releasing an unheld lock or driving a counter below zero does not cause
//! memory unsafety in this crate, but it silently breaks the primitive for
//! every other thread. With checks enabled, [`sw_invariant!`] turns such a
//! breach into an immediate `abort` after a fatal log line. Without them the
//! macro expands to nothing and the condition is not evaluated.
//!
//! Checks are enabled in debug builds and whenever the `checked` feature is on.

use core::fmt;

/// `true` when [`sw_invariant!`] evaluates its condition.
pub const CHECKS_ENABLED: bool = cfg!(any(debug_assertions, feature = "checked"));

/// Reports a broken invariant and aborts the process.
///
/// Unwinding is not attempted: other threads may be spinning on the state
/// that just broke.
#[cold]
#[inline(never)]
pub fn invariant_violation(what: fmt::Arguments<'_>) -> ! {
    crate::sw_fatal!("invariant violated: {}", what);
    std::process::abort()
}

/// Aborts via [`invariant_violation`] if `cond` is false and checks are on.
///
/// ```ignore
/// sw_invariant!(count > 0, "release with count {}", count);
/// ```
#[macro_export]
macro_rules! sw_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if $crate::invariant::CHECKS_ENABLED && !$cond {
            $crate::invariant::invariant_violation(format_args!($($arg)+));
        }
    };
}

//! Retry-loop pacing for busy-wait paths.
//!
//! Every spin loop in this crate polls its condition, and on failure calls
//! [`BackoffWaiter::snooze`] once before polling again.

/// Policy applied between failed polls of a busy-wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Backoff {
    /// One `spin_loop` hint per poll.
    #[default]
    None,
    /// Exponentially growing spin, then yielding to the OS scheduler once the
    /// spin budget is exhausted.
    Exponential,
    /// Yield the time slice on every failed poll.
    Yield,
}

impl Backoff {
    /// All policies, in declaration order.
    pub const ALL: [Backoff; 3] = [Backoff::None, Backoff::Exponential, Backoff::Yield];

    /// Returns the kebab-case name used in configuration files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Exponential => "exponential",
            Self::Yield => "yield",
        }
    }

    /// Starts a new wait loop under this policy.
    pub fn waiter(self) -> BackoffWaiter {
        BackoffWaiter {
            policy: self,
            exp: crossbeam_utils::Backoff::new(),
        }
    }
}

impl core::str::FromStr for Backoff {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or(UnknownName)
    }
}

/// Returned by the `FromStr` impls of the policy and kind enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownName;

impl core::fmt::Display for UnknownName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("unrecognized name")
    }
}

impl std::error::Error for UnknownName {}

/// Per-loop backoff state. Create one per wait with [`Backoff::waiter`].
pub struct BackoffWaiter {
    policy: Backoff,
    exp: crossbeam_utils::Backoff,
}

impl BackoffWaiter {
    /// Waits once according to the policy.
    #[inline]
    pub fn snooze(&mut self) {
        match self.policy {
            Backoff::None => core::hint::spin_loop(),
            Backoff::Exponential => self.exp.snooze(),
            Backoff::Yield => std::thread::yield_now(),
        }
    }

    /// Restarts the exponential schedule after the loop made progress.
    pub fn reset(&mut self) {
        self.exp.reset();
    }

    /// Returns `true` once the exponential policy has stopped spinning and
    /// started yielding. Always `false` for the other policies.
    pub fn is_yielding(&self) -> bool {
        self.policy == Backoff::Exponential && self.exp.is_completed()
    }
}

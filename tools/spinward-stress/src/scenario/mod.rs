//! Stress scenarios, one per concurrency property.
//!
//! Each scenario hammers one primitive from many threads while checking its
//! property with counters kept outside the primitive. The first violation
//! either aborts the process (the default) or is recorded, stops the
//! workers that can stop safely, and is returned as an error.

pub mod barrier;
pub mod monitor;
pub mod mutex;
pub mod reentrant;
pub mod rwlock;
pub mod semaphore;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde::Serialize;
use spinward::Monitor;

/// A property breach observed by a scenario.
#[derive(Debug, Clone)]
pub struct Violation {
    /// What was being checked.
    pub what: &'static str,
    /// What was seen instead, e.g. `observed 4, bound 3`.
    pub detail: String,
}

impl Violation {
    fn bound(what: &'static str, observed: usize, bound: usize) -> Self {
        Self {
            what,
            detail: format!("observed {observed}, bound {bound}"),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.what, self.detail)
    }
}

/// Collects the first violation of a run.
pub struct Watch {
    abort: bool,
    first: Monitor<Option<Violation>>,
    stop: AtomicBool,
}

impl Watch {
    /// Creates a watch. With `abort`, the first violation ends the process.
    pub fn new(abort: bool) -> Self {
        Self {
            abort,
            first: Monitor::new(None),
            stop: AtomicBool::new(false),
        }
    }

    /// Records `v`; aborts instead when configured to.
    pub fn report(&self, v: Violation) {
        if self.abort {
            spinward::invariant::invariant_violation(format_args!("{v}"));
        }
        spinward::sw_error!("violation: {}", v);
        self.first.with(|first| {
            first.get_or_insert(v);
        });
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Checks `observed <= bound`, reporting a violation otherwise.
    pub fn at_most(&self, what: &'static str, observed: usize, bound: usize) {
        if observed > bound {
            self.report(Violation::bound(what, observed, bound));
        }
    }

    /// Checks `observed == expected`, reporting a violation otherwise.
    pub fn exactly(&self, what: &'static str, observed: usize, expected: usize) {
        if observed != expected {
            self.report(Violation::bound(what, observed, expected));
        }
    }

    /// Reports a breach that is not a count, described by `detail`.
    pub fn fail(&self, what: &'static str, detail: impl fmt::Display) {
        self.report(Violation {
            what,
            detail: detail.to_string(),
        });
    }

    /// `true` once a violation was recorded; workers may exit early.
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Turns the recorded violation, if any, into an error naming the
    /// scenario.
    pub fn finish(self, scenario: &str) -> Result<()> {
        match self.first.into_inner() {
            Some(v) => Err(anyhow!("{scenario}: {v}")),
            None => Ok(()),
        }
    }
}

/// Outcome of a passing scenario.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: &'static str,
    /// Primitive flavor that was exercised.
    pub subject: String,
    /// Wall-clock run time.
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Named measurements, e.g. the highest concurrency observed.
    pub metrics: BTreeMap<&'static str, u64>,
}

impl ScenarioReport {
    fn new(name: &'static str, subject: impl fmt::Display, started: Instant) -> Self {
        Self {
            name,
            subject: subject.to_string(),
            elapsed: started.elapsed(),
            metrics: BTreeMap::new(),
        }
    }

    fn metric(mut self, key: &'static str, value: impl TryInto<u64>) -> Self {
        self.metrics.insert(key, value.try_into().unwrap_or(u64::MAX));
        self
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

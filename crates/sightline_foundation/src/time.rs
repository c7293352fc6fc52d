//! Time sources.
//!
//! Every cache TTL and scheduler deadline reads time through [`Clock`] so
//! tests can drive time with a [`ManualClock`].

use std::cell::Cell;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Milliseconds on a monotonic timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Millis(pub u64);

impl Millis {
    /// The zero instant.
    pub const ZERO: Millis = Millis(0);

    /// Time elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub const fn since(self, earlier: Millis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u64> for Millis {
    type Output = Millis;

    fn add(self, rhs: u64) -> Millis {
        Millis(self.0.saturating_add(rhs))
    }
}

impl Sub<u64> for Millis {
    type Output = Millis;

    fn sub(self, rhs: u64) -> Millis {
        Millis(self.0.saturating_sub(rhs))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A source of the current time.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> Millis;
}

/// Wall-clock time measured from construction.
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose zero is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        let elapsed = self.origin.elapsed().as_millis();
        Millis(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    /// Creates a clock at the given time.
    #[must_use]
    pub fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start.0),
        }
    }

    /// Moves time forward.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Jumps to an absolute time. Moving backwards is ignored.
    pub fn set(&self, at: Millis) {
        if at.0 > self.now.get() {
            self.now.set(at.0);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.now.get())
    }
}

//! Bounded record of degraded results, breaker trips, and skipped work.

use std::collections::VecDeque;
use std::fmt;

use sightline_engine::FallbackTier;
use sightline_foundation::{Capability, Millis, TokenId};

/// What kind of thing happened.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticKind {
    /// A fallback tier answered instead of the full computation.
    Fallback {
        /// The capability that failed.
        capability: Capability,
        /// The tier that answered.
        tier: FallbackTier,
    },
    /// The circuit breaker refused a full recompute.
    BreakerTripped,
    /// A capability probe was scheduled.
    RetryScheduled {
        /// The capability being probed.
        capability: Capability,
        /// Delay before the probe.
        delay_ms: u64,
    },
    /// The retry budget ran out; the fallback stays in effect.
    RetryExhausted(Capability),
    /// An override stopped holding and was cleared.
    OverrideInvalidated {
        /// The perceiving token.
        observer: TokenId,
        /// The perceived token.
        target: TokenId,
    },
    /// A store write failed.
    WriteFailed,
}

impl DiagnosticKind {
    /// Short name for filtering.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fallback { .. } => "fallback",
            Self::BreakerTripped => "breaker",
            Self::RetryScheduled { .. } => "retry",
            Self::RetryExhausted(_) => "retry-exhausted",
            Self::OverrideInvalidated { .. } => "override-invalidated",
            Self::WriteFailed => "write-failed",
        }
    }
}

/// One diagnostic entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Monotonic id.
    pub id: u64,
    /// When it was recorded.
    pub at: Millis,
    /// What happened.
    pub kind: DiagnosticKind,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.at, self.kind.name(), self.message)
    }
}

/// Ring buffer of diagnostics, oldest dropped first.
#[derive(Clone, Debug)]
pub struct DiagnosticLog {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
    next_id: u64,
}

impl DiagnosticLog {
    /// Creates a log holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_id: 0,
        }
    }

    /// Records an entry and returns its id.
    pub fn push(&mut self, at: Millis, kind: DiagnosticKind, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.capacity == 0 {
            return id;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Diagnostic {
            id,
            at,
            kind,
            message: message.into(),
        });
        id
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all entries. Ids keep increasing.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// The most recent `count` entries, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&Diagnostic> {
        let start = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(start).collect()
    }

    /// Entries with the given kind name.
    #[must_use]
    pub fn by_kind(&self, name: &str) -> Vec<&Diagnostic> {
        self.entries.iter().filter(|d| d.kind.name() == name).collect()
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(256)
    }
}

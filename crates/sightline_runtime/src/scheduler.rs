//! Deterministic delayed tasks with cancel-and-reschedule semantics.
//!
//! Nothing runs on its own. The owner asks for due tasks with
//! [`Scheduler::take_due`] at a given time, so tests drive time by hand.

use std::collections::BTreeMap;
use std::fmt;

use sightline_foundation::{Capability, Millis, TokenId};

/// Work the orchestrator can schedule.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKey {
    /// Throttled recompute of one token's pairs.
    TokenRecompute(TokenId),
    /// Debounced recompute of the whole scene.
    SceneRecompute,
    /// Re-probe of a failed capability.
    Probe(Capability),
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenRecompute(id) => write!(f, "recompute {id}"),
            Self::SceneRecompute => f.write_str("recompute scene"),
            Self::Probe(capability) => write!(f, "probe {capability}"),
        }
    }
}

/// At most one pending run per key.
#[derive(Clone, Debug)]
pub struct Scheduler<K: Ord + Clone> {
    pending: BTreeMap<K, Millis>,
}

impl<K: Ord + Clone> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> Scheduler<K> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    /// Schedules `key` to run at `now + delay_ms`, replacing any pending run.
    ///
    /// Returns true if an earlier run was cancelled.
    pub fn schedule(&mut self, key: K, now: Millis, delay_ms: u64) -> bool {
        self.pending.insert(key, now + delay_ms).is_some()
    }

    /// Schedules `key` only if nothing is pending for it.
    ///
    /// Returns true if it was scheduled.
    pub fn schedule_if_idle(&mut self, key: K, now: Millis, delay_ms: u64) -> bool {
        if self.pending.contains_key(&key) {
            return false;
        }
        self.pending.insert(key, now + delay_ms);
        true
    }

    /// Cancels a pending run. Returns true if one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Cancels everything. Returns how many runs were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Removes and returns every task due at `now`, earliest first.
    pub fn take_due(&mut self, now: Millis) -> Vec<K> {
        let mut due: Vec<(Millis, K)> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (*at, k.clone()))
            .collect();
        due.sort();
        for (_, key) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(_, k)| k).collect()
    }

    /// When `key` is due, if pending.
    #[must_use]
    pub fn due_at(&self, key: &K) -> Option<Millis> {
        self.pending.get(key).copied()
    }

    /// Earliest pending due time.
    #[must_use]
    pub fn next_due(&self) -> Option<Millis> {
        self.pending.values().min().copied()
    }

    /// Returns true if `key` is pending.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of pending runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

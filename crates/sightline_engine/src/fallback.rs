//! Tiered degradation when a capability fails.
//!
//! Resolution tries, in order: the real computation, a geometric
//! approximation, the stored manual value, and a conservative constant.
//! Every result carries the tier it came from and a short explanation.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{Capability, Error, Millis, RateLimit, Result};

/// Where a resolved value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FallbackTier {
    /// The full computation succeeded.
    Computed,
    /// A coarser geometric approximation.
    Approximation,
    /// The last stored value.
    StoredManual,
    /// A hard-coded conservative default.
    Constant,
}

impl fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Computed => "computed",
            Self::Approximation => "approximation",
            Self::StoredManual => "stored",
            Self::Constant => "constant",
        };
        f.write_str(name)
    }
}

/// A value tagged with the tier that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved<T> {
    /// The value.
    pub value: T,
    /// Which tier produced it.
    pub tier: FallbackTier,
    /// Why this tier was used.
    pub explanation: String,
}

impl<T> Resolved<T> {
    /// A value from the full computation.
    pub fn computed(value: T) -> Self {
        Self {
            value,
            tier: FallbackTier::Computed,
            explanation: String::new(),
        }
    }

    /// Returns true if any fallback tier was used.
    pub fn is_degraded(&self) -> bool {
        self.tier != FallbackTier::Computed
    }
}

/// Walks the fallback tiers until one yields a value.
///
/// `primary` is tried first; its error becomes the explanation for whichever
/// tier finally answers.
pub fn resolve_with_fallback<T>(
    primary: impl FnOnce() -> Result<T>,
    approximation: impl FnOnce() -> Result<T>,
    stored: impl FnOnce() -> Option<T>,
    constant: T,
) -> Resolved<T> {
    let primary_error = match primary() {
        Ok(value) => return Resolved::computed(value),
        Err(e) => e,
    };

    match approximation() {
        Ok(value) => Resolved {
            value,
            tier: FallbackTier::Approximation,
            explanation: format!("{primary_error}; using geometric approximation"),
        },
        Err(approx_error) => match stored() {
            Some(value) => Resolved {
                value,
                tier: FallbackTier::StoredManual,
                explanation: format!(
                    "{primary_error}; approximation failed ({approx_error}); using stored value"
                ),
            },
            None => Resolved {
                value: constant,
                tier: FallbackTier::Constant,
                explanation: format!(
                    "{primary_error}; approximation failed ({approx_error}); no stored value"
                ),
            },
        },
    }
}

// =============================================================================
// Retry
// =============================================================================

/// Exponential backoff for re-probing failed capabilities.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RetryPolicy {
    /// Delay before the first probe.
    pub base_delay_ms: u64,
    /// Probes allowed before giving up.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before probe number `attempt`, counting from zero.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> u64 {
        1u64.checked_shl(attempt)
            .and_then(|factor| self.base_delay_ms.checked_mul(factor))
            .unwrap_or(u64::MAX)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Degradation {
    since: Millis,
    attempts: u32,
    exhausted: bool,
}

/// Tracks which capabilities are degraded and their retry budget.
#[derive(Clone, Debug, Default)]
pub struct CapabilityHealth {
    policy: RetryPolicy,
    degraded: BTreeMap<Capability, Degradation>,
}

impl CapabilityHealth {
    /// Creates a tracker with the given retry policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            degraded: BTreeMap::new(),
        }
    }

    /// Records a failure and returns the delay before the next probe.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` once the retry budget is spent. The capability
    /// stays degraded until [`CapabilityHealth::reset`].
    pub fn mark_failed(&mut self, capability: Capability, now: Millis) -> Result<u64> {
        let entry = self.degraded.entry(capability).or_insert(Degradation {
            since: now,
            attempts: 0,
            exhausted: false,
        });
        if entry.exhausted || entry.attempts >= self.policy.max_attempts {
            entry.exhausted = true;
            return Err(Error::limit_exceeded(RateLimit::RetryAttempts {
                capability,
                limit: self.policy.max_attempts,
            }));
        }
        let delay = self.policy.delay(entry.attempts);
        entry.attempts += 1;
        Ok(delay)
    }

    /// Clears a capability's failure state after a successful probe.
    pub fn mark_healthy(&mut self, capability: Capability) {
        if self.degraded.remove(&capability).is_some() {
            tracing::info!(%capability, "capability recovered");
        }
    }

    /// Returns true if the capability is currently degraded.
    #[must_use]
    pub fn is_degraded(&self, capability: Capability) -> bool {
        self.degraded.contains_key(&capability)
    }

    /// Returns true if retries for the capability are exhausted.
    #[must_use]
    pub fn is_exhausted(&self, capability: Capability) -> bool {
        self.degraded.get(&capability).is_some_and(|d| d.exhausted)
    }

    /// Probes made so far for a capability.
    #[must_use]
    pub fn attempts(&self, capability: Capability) -> u32 {
        self.degraded.get(&capability).map_or(0, |d| d.attempts)
    }

    /// When the capability first failed, if degraded.
    #[must_use]
    pub fn degraded_since(&self, capability: Capability) -> Option<Millis> {
        self.degraded.get(&capability).map(|d| d.since)
    }

    /// Forgets all failure state.
    pub fn reset(&mut self) {
        self.degraded.clear();
    }
}

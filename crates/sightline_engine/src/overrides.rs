//! Override management and precedence.
//!
//! [`OverrideManager`] owns the flag store and is the only writer of
//! override flags. [`ManualOverrideDetector`] applies the fixed precedence:
//!
//! 1. point-out: hidden instead of undetected, only for invisible targets
//! 2. seek: its state wins outright
//! 3. hide, sneak, or manual edit: pins the stored state

use std::rc::Rc;

use sightline_foundation::{Clock, CoverState, Result, TokenId, VisibilityState};
use sightline_storage::{
    FlagStore, OverrideRecord, OverrideSource, override_key, parse_override_key,
};

// =============================================================================
// Check result
// =============================================================================

/// Overrides present for one direction of a pair, sorted by precedence slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverrideCheck {
    /// A point-out result.
    pub point_out: Option<OverrideRecord>,
    /// A seek result.
    pub seek: Option<OverrideRecord>,
    /// A hide, sneak, or manual-edit pin.
    pub sneak: Option<OverrideRecord>,
    /// True if any override is present.
    pub has_any: bool,
}

impl OverrideCheck {
    /// A check with nothing present.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sorts a record into its precedence slot.
    #[must_use]
    pub fn from_record(record: Option<OverrideRecord>) -> Self {
        let Some(record) = record else {
            return Self::none();
        };
        let mut check = Self {
            has_any: true,
            ..Self::default()
        };
        match record.source {
            OverrideSource::PointOut => check.point_out = Some(record),
            OverrideSource::Seek => check.seek = Some(record),
            OverrideSource::Hide | OverrideSource::Sneak | OverrideSource::ManualEdit => {
                check.sneak = Some(record);
            }
        }
        check
    }

    /// The pinned state a sneak-style override holds, if any.
    #[must_use]
    pub fn sneak_state(&self) -> Option<VisibilityState> {
        self.sneak.as_ref().map(|r| r.state)
    }

    /// The cover pinned by whichever override is present.
    #[must_use]
    pub fn pinned_cover(&self) -> Option<CoverState> {
        [&self.seek, &self.sneak, &self.point_out]
            .into_iter()
            .flatten()
            .find_map(|r| r.cover)
    }
}

// =============================================================================
// Precedence
// =============================================================================

/// What the override precedence decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideDecision {
    /// No override applies; compute normally.
    Continue,
    /// An override decides the state outright.
    Return(VisibilityState, OverrideSource),
    /// The stored state is pinned against automatic writes.
    Pinned(VisibilityState, OverrideSource),
}

impl OverrideDecision {
    /// The decided state, if computation stops here.
    #[must_use]
    pub fn state(self) -> Option<VisibilityState> {
        match self {
            Self::Continue => None,
            Self::Return(state, _) | Self::Pinned(state, _) => Some(state),
        }
    }
}

/// Applies override precedence ahead of automatic computation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualOverrideDetector;

impl ManualOverrideDetector {
    /// Decides how overrides affect this direction.
    #[must_use]
    pub fn decide(check: &OverrideCheck, target_invisible: bool) -> OverrideDecision {
        if check.point_out.is_some() && target_invisible {
            return OverrideDecision::Return(VisibilityState::Hidden, OverrideSource::PointOut);
        }
        if let Some(seek) = &check.seek {
            return OverrideDecision::Return(seek.state, OverrideSource::Seek);
        }
        if let Some(pin) = &check.sneak {
            return OverrideDecision::Pinned(pin.state, pin.source);
        }
        OverrideDecision::Continue
    }
}

/// Returns true if an override's requirements still hold.
///
/// `cover` and `visibility` are the automatically computed values for the
/// same direction with the override ignored.
#[must_use]
pub fn requirements_hold(
    record: &OverrideRecord,
    cover: CoverState,
    visibility: VisibilityState,
) -> bool {
    let cover_ok = !record.requires_cover || cover > CoverState::None;
    let concealment_ok = !record.requires_concealment || visibility < VisibilityState::Observed;
    cover_ok && concealment_ok
}

// =============================================================================
// Manager
// =============================================================================

/// Reads and writes override flags.
pub struct OverrideManager<F: FlagStore> {
    store: F,
    clock: Rc<dyn Clock>,
}

impl<F: FlagStore + std::fmt::Debug> std::fmt::Debug for OverrideManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideManager")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<F: FlagStore> OverrideManager<F> {
    /// Creates a manager over a flag store.
    pub fn new(store: F, clock: Rc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the flag store.
    pub fn store(&self) -> &F {
        &self.store
    }

    /// Consumes the manager, returning the flag store.
    pub fn into_store(self) -> F {
        self.store
    }

    /// Writes an override, replacing any earlier one for the same direction.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag store rejects the write.
    pub fn apply_override(&mut self, record: OverrideRecord) -> Result<()> {
        tracing::debug!(
            observer = %record.observer,
            target = %record.target,
            source = %record.source,
            state = %record.state,
            "applying override"
        );
        let target = record.target.clone();
        let key = record.key();
        self.store.set(&target, &key, record)
    }

    /// Removes the override for one direction. Returns true if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag store rejects the removal.
    pub fn remove_override(&mut self, observer: &TokenId, target: &TokenId) -> Result<bool> {
        self.store.unset(target, &override_key(observer))
    }

    /// Removes every override involving `token` in either direction, or every
    /// override when `token` is `None`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns the first error from the flag store; earlier removals stand.
    pub fn clear_all_overrides(&mut self, token: Option<&TokenId>) -> Result<usize> {
        let mut doomed: Vec<(TokenId, String)> = Vec::new();
        for target in self.store.tokens() {
            for key in self.store.keys(&target) {
                let Some(observer) = parse_override_key(&key) else {
                    continue;
                };
                let involved = token.is_none_or(|t| *t == target || *t == observer);
                if involved {
                    doomed.push((target.clone(), key));
                }
            }
        }

        let mut removed = 0;
        for (target, key) in doomed {
            if self.store.unset(&target, &key)? {
                removed += 1;
            }
        }
        tracing::info!(token = ?token, removed, "cleared overrides");
        Ok(removed)
    }

    /// Reads the live override for one direction.
    ///
    /// Expired records are removed on read and reported as absent.
    pub fn get(&mut self, observer: &TokenId, target: &TokenId) -> Option<OverrideRecord> {
        let key = override_key(observer);
        let record = self.store.get(target, &key)?;
        if record.is_expired(self.clock.now()) {
            tracing::debug!(%observer, %target, "override expired");
            if let Err(e) = self.store.unset(target, &key) {
                tracing::warn!(%observer, %target, error = %e, "failed to drop expired override");
            }
            return None;
        }
        Some(record)
    }

    /// Sorts the live override for one direction into precedence slots.
    pub fn check_all_overrides(&mut self, observer: &TokenId, target: &TokenId) -> OverrideCheck {
        OverrideCheck::from_record(self.get(observer, target))
    }

    /// Live overrides where `token` is observer or target.
    pub fn overrides_involving(&mut self, token: &TokenId) -> Vec<OverrideRecord> {
        let mut found = Vec::new();
        for target in self.store.tokens() {
            for key in self.store.keys(&target) {
                let Some(observer) = parse_override_key(&key) else {
                    continue;
                };
                if *token != target && *token != observer {
                    continue;
                }
                if let Some(record) = self.get(&observer, &target) {
                    found.push(record);
                }
            }
        }
        found
    }

    /// Every live override.
    pub fn all_overrides(&mut self) -> Vec<OverrideRecord> {
        let mut found = Vec::new();
        for target in self.store.tokens() {
            for key in self.store.keys(&target) {
                let Some(observer) = parse_override_key(&key) else {
                    continue;
                };
                if let Some(record) = self.get(&observer, &target) {
                    found.push(record);
                }
            }
        }
        found
    }
}

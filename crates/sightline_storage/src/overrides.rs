//! Override records and the flag store that persists them.
//!
//! Overrides live on the target token under the key
//! `override-from-<observerId>`, so each direction of a pair has its own
//! key and clearing one never touches the other.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{CoverState, Millis, Result, TokenId, VisibilityState};

/// Prefix of every override flag key.
pub const OVERRIDE_KEY_PREFIX: &str = "override-from-";

/// Builds the flag key for overrides set by `observer`.
#[must_use]
pub fn override_key(observer: &TokenId) -> String {
    format!("{OVERRIDE_KEY_PREFIX}{observer}")
}

/// Extracts the observer id from an override flag key.
#[must_use]
pub fn parse_override_key(key: &str) -> Option<TokenId> {
    key.strip_prefix(OVERRIDE_KEY_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(TokenId::new)
}

/// What created an override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OverrideSource {
    /// Result of a Seek action.
    Seek,
    /// Result of a Hide action.
    Hide,
    /// Result of a Sneak action.
    Sneak,
    /// Result of a Point Out action.
    PointOut,
    /// Set by hand.
    ManualEdit,
}

impl fmt::Display for OverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seek => "seek",
            Self::Hide => "hide",
            Self::Sneak => "sneak",
            Self::PointOut => "point-out",
            Self::ManualEdit => "manual-edit",
        };
        f.write_str(name)
    }
}

/// A pinned, source-tagged relationship state for one direction of a pair.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OverrideRecord {
    /// The perceiving token.
    pub observer: TokenId,
    /// The perceived token.
    pub target: TokenId,
    /// What created the override.
    pub source: OverrideSource,
    /// Pinned visibility.
    pub state: VisibilityState,
    /// Pinned cover, if the action fixed one.
    pub cover: Option<CoverState>,
    /// When the override was created.
    pub timestamp: Millis,
    /// When the override stops applying, if ever.
    pub expires_at: Option<Millis>,
    /// The override holds only while the target keeps some cover.
    pub requires_cover: bool,
    /// The override holds only while the target stays at least concealed.
    pub requires_concealment: bool,
}

impl OverrideRecord {
    /// Creates an override with no expiry or requirements.
    #[must_use]
    pub fn new(
        observer: TokenId,
        target: TokenId,
        source: OverrideSource,
        state: VisibilityState,
        timestamp: Millis,
    ) -> Self {
        Self {
            observer,
            target,
            source,
            state,
            cover: None,
            timestamp,
            expires_at: None,
            requires_cover: false,
            requires_concealment: false,
        }
    }

    /// Builder method to pin cover as well.
    #[must_use]
    pub fn with_cover(mut self, cover: CoverState) -> Self {
        self.cover = Some(cover);
        self
    }

    /// Builder method to set an expiry.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: Millis) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Builder method to set validation requirements.
    #[must_use]
    pub fn with_requirements(mut self, cover: bool, concealment: bool) -> Self {
        self.requires_cover = cover;
        self.requires_concealment = concealment;
        self
    }

    /// Returns true if the override no longer applies at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Millis) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// The flag key this record is stored under.
    #[must_use]
    pub fn key(&self) -> String {
        override_key(&self.observer)
    }
}

/// Per-token persisted flags holding override records.
pub trait FlagStore {
    /// Reads a flag from a token.
    fn get(&self, token: &TokenId, key: &str) -> Option<OverrideRecord>;

    /// Writes a flag on a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write.
    fn set(&mut self, token: &TokenId, key: &str, record: OverrideRecord) -> Result<()>;

    /// Removes a flag. Returns true if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the removal.
    fn unset(&mut self, token: &TokenId, key: &str) -> Result<bool>;

    /// All flag keys on a token.
    fn keys(&self, token: &TokenId) -> Vec<String>;

    /// All tokens carrying at least one flag.
    fn tokens(&self) -> Vec<TokenId>;
}

/// In-memory flag store.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemoryFlagStore {
    flags: BTreeMap<TokenId, BTreeMap<String, OverrideRecord>>,
}

impl MemoryFlagStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of flags across all tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.values().map(BTreeMap::len).sum()
    }

    /// Returns true if no flags are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, token: &TokenId, key: &str) -> Option<OverrideRecord> {
        self.flags.get(token).and_then(|m| m.get(key)).cloned()
    }

    fn set(&mut self, token: &TokenId, key: &str, record: OverrideRecord) -> Result<()> {
        self.flags
            .entry(token.clone())
            .or_default()
            .insert(key.to_string(), record);
        Ok(())
    }

    fn unset(&mut self, token: &TokenId, key: &str) -> Result<bool> {
        let Some(map) = self.flags.get_mut(token) else {
            return Ok(false);
        };
        let removed = map.remove(key).is_some();
        if map.is_empty() {
            self.flags.remove(token);
        }
        Ok(removed)
    }

    fn keys(&self, token: &TokenId) -> Vec<String> {
        self.flags
            .get(token)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn tokens(&self) -> Vec<TokenId> {
        self.flags.keys().cloned().collect()
    }
}

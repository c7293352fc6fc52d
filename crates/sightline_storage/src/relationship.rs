//! Persisted relationship states.
//!
//! The store is an external collaborator keyed by ordered `(observer, target)`
//! pairs. Writes must be idempotent: rewriting the stored value is harmless.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{CoverState, Result, TokenId, VisibilityState};

/// An ordered `(observer, target)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairKey {
    /// The perceiving token.
    pub observer: TokenId,
    /// The perceived token.
    pub target: TokenId,
}

impl PairKey {
    /// Creates a pair key.
    #[must_use]
    pub fn new(observer: TokenId, target: TokenId) -> Self {
        Self { observer, target }
    }

    /// The same pair seen from the other side.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.target.clone(), self.observer.clone())
    }
}

/// Key-value persistence for visibility and cover states.
pub trait RelationshipStore {
    /// Stored visibility for the pair, if any.
    fn visibility(&self, key: &PairKey) -> Option<VisibilityState>;

    /// Stores visibility for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write.
    fn set_visibility(&mut self, key: PairKey, state: VisibilityState) -> Result<()>;

    /// Stored cover for the pair, if any.
    fn cover(&self, key: &PairKey) -> Option<CoverState>;

    /// Stores cover for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write.
    fn set_cover(&mut self, key: PairKey, state: CoverState) -> Result<()>;

    /// Drops every entry that mentions the token on either side.
    fn forget_token(&mut self, token: &TokenId);
}

/// In-memory relationship store that counts writes.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemoryRelationshipStore {
    visibility: BTreeMap<PairKey, VisibilityState>,
    cover: BTreeMap<PairKey, CoverState>,
    #[cfg_attr(feature = "serde", serde(skip))]
    writes: u64,
}

impl MemoryRelationshipStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of writes accepted since creation.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Number of stored visibility entries.
    #[must_use]
    pub fn visibility_len(&self) -> usize {
        self.visibility.len()
    }

    /// Iterates stored visibility entries in key order.
    pub fn visibility_entries(&self) -> impl Iterator<Item = (&PairKey, &VisibilityState)> {
        self.visibility.iter()
    }

    /// Iterates stored cover entries in key order.
    pub fn cover_entries(&self) -> impl Iterator<Item = (&PairKey, &CoverState)> {
        self.cover.iter()
    }
}

impl RelationshipStore for MemoryRelationshipStore {
    fn visibility(&self, key: &PairKey) -> Option<VisibilityState> {
        self.visibility.get(key).copied()
    }

    fn set_visibility(&mut self, key: PairKey, state: VisibilityState) -> Result<()> {
        self.writes += 1;
        self.visibility.insert(key, state);
        Ok(())
    }

    fn cover(&self, key: &PairKey) -> Option<CoverState> {
        self.cover.get(key).copied()
    }

    fn set_cover(&mut self, key: PairKey, state: CoverState) -> Result<()> {
        self.writes += 1;
        self.cover.insert(key, state);
        Ok(())
    }

    fn forget_token(&mut self, token: &TokenId) {
        self.visibility
            .retain(|k, _| &k.observer != token && &k.target != token);
        self.cover
            .retain(|k, _| &k.observer != token && &k.target != token);
    }
}

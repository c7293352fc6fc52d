//! Snapshot persistence using `MessagePack`.
//!
//! Overrides and stored relationships survive a reload by round-tripping
//! through a [`PersistedState`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use sightline_foundation::{CoverState, Error, ErrorKind, Result, VisibilityState};
use sightline_storage::{
    FlagStore, MemoryFlagStore, MemoryRelationshipStore, OverrideRecord, PairKey,
    RelationshipStore,
};

/// Everything the orchestrator persists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Every stored override, live or expired.
    pub overrides: Vec<OverrideRecord>,
    /// Stored visibility per direction.
    pub visibility: Vec<(PairKey, VisibilityState)>,
    /// Stored cover per direction.
    pub cover: Vec<(PairKey, CoverState)>,
}

impl PersistedState {
    /// Captures the contents of both stores.
    #[must_use]
    pub fn capture(relationships: &MemoryRelationshipStore, flags: &MemoryFlagStore) -> Self {
        let overrides = flags
            .tokens()
            .iter()
            .flat_map(|token| {
                flags
                    .keys(token)
                    .into_iter()
                    .filter_map(move |key| flags.get(token, &key))
            })
            .collect();
        Self {
            overrides,
            visibility: relationships
                .visibility_entries()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            cover: relationships
                .cover_entries()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Rebuilds both stores.
    ///
    /// # Errors
    ///
    /// Returns an error if a store rejects a write.
    pub fn restore(&self) -> Result<(MemoryRelationshipStore, MemoryFlagStore)> {
        let mut flags = MemoryFlagStore::new();
        for record in &self.overrides {
            flags.set(&record.target, &record.key(), record.clone())?;
        }
        let mut relationships = MemoryRelationshipStore::new();
        for (key, state) in &self.visibility {
            relationships.set_visibility(key.clone(), *state)?;
        }
        for (key, cover) in &self.cover {
            relationships.set_cover(key.clone(), *cover)?;
        }
        Ok((relationships, flags))
    }
}

/// Serializes a snapshot to bytes using `MessagePack` format.
///
/// Uses named serialization to preserve struct field names.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(state: &PersistedState) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(state)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

/// Deserializes a snapshot from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn from_bytes(bytes: &[u8]) -> Result<PersistedState> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

/// Saves a snapshot to a file, creating or overwriting it.
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails.
pub fn save_to_file<P: AsRef<Path>>(state: &PersistedState, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to create file '{}': {e}",
            path.display()
        )))
    })?;

    let mut writer = BufWriter::new(file);
    let bytes = to_bytes(state)?;
    writer.write_all(&bytes).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to write to file '{}': {e}",
            path.display()
        )))
    })?;
    writer.flush().map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to flush file '{}': {e}",
            path.display()
        )))
    })?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved relationship snapshot");
    Ok(())
}

/// Loads a snapshot from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialization fails.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<PersistedState> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to open file '{}': {e}",
            path.display()
        )))
    })?;

    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to read file '{}': {e}",
            path.display()
        )))
    })?;

    from_bytes(&bytes)
}

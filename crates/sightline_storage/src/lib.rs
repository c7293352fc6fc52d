//! Scene snapshots, relationship store, and override flags for Sightline.
//!
//! This crate provides:
//! - [`Scene`] - Immutable scene snapshot with structural sharing
//! - [`Token`] - Positioned game pieces and their actor data
//! - [`RelationshipStore`] - Persisted visibility and cover per ordered pair
//! - [`FlagStore`] - Persisted per-token override flags

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod overrides;
pub mod relationship;
pub mod scene;
pub mod token;

pub use overrides::{
    FlagStore, MemoryFlagStore, OVERRIDE_KEY_PREFIX, OverrideRecord, OverrideSource, override_key,
    parse_override_key,
};
pub use relationship::{MemoryRelationshipStore, PairKey, RelationshipStore};
pub use scene::{
    DarknessMode, DarknessOverride, DoorState, GridConfig, LightSource, Region, Scene, Wall,
};
pub use token::{
    ActorData, Alliance, Condition, LightEmission, Sense, SenseKind, SizeCategory, Token,
};

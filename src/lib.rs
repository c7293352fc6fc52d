//! Sightline - Visibility and cover relationships for tokens on a 2-D scene
//!
//! This crate re-exports all layers of the Sightline system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: sightline_runtime     Orchestrator, scheduling, events, persistence
//! Layer 2: sightline_engine      Lighting, vision, invisibility, overrides, cover
//! Layer 1: sightline_storage     Scene snapshots, relationship and flag stores
//! Layer 0: sightline_foundation  Ids, geometry, state ladders, clock, Error
//! ```

pub use sightline_engine as engine;
pub use sightline_foundation as foundation;
pub use sightline_runtime as runtime;
pub use sightline_storage as storage;

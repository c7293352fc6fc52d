//! Relationship computation for Sightline.
//!
//! This crate provides:
//! - [`LightingCalculator`] - Illumination at a point
//! - [`VisionAnalyzer`] - Vision capabilities and line of sight
//! - [`InvisibilityResolver`] - What invisibility collapses to
//! - [`OverrideManager`] and [`ManualOverrideDetector`] - Pinned states and precedence
//! - [`CoverDetector`] - Cover from walls and blocking tokens
//! - [`VisibilityCalculator`] - All of the above for one direction of a pair
//! - [`resolve_with_fallback`] - Tiered degradation when a capability fails

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cover;
pub mod fallback;
pub mod invisibility;
pub mod lighting;
pub mod overrides;
pub mod visibility;
pub mod vision;

pub use cover::{
    BlockerFilter, CoverConfig, CoverDetector, CoverOptions, CoverReport, IntersectionMode,
    combine as combine_cover,
};
pub use fallback::{CapabilityHealth, FallbackTier, Resolved, RetryPolicy, resolve_with_fallback};
pub use invisibility::InvisibilityResolver;
pub use lighting::{Illumination, LightingCalculator, LightingConfig};
pub use overrides::{
    ManualOverrideDetector, OverrideCheck, OverrideDecision, OverrideManager, requirements_hold,
};
pub use visibility::{VisibilityCalculator, VisibilityOutcome, VisibilityReason};
pub use vision::{HostVisibility, VisionAnalyzer, VisionCapability, VisionConfig};

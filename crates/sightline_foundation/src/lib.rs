//! Identifiers, geometry, state ladders, clocks, and caches for Sightline.
//!
//! This crate provides:
//! - [`TokenId`] and friends - Stable identifiers for scene objects
//! - [`Point`], [`Segment`], [`Rect`], [`Polygon`] - 2-D geometry primitives
//! - [`VisibilityState`], [`CoverState`], [`IlluminationLevel`] - Ordered state ladders
//! - [`Clock`] - Time source abstraction with a deterministic [`ManualClock`]
//! - [`TtlCache`] - Time-boxed cache read through a staleness check
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod state;
pub mod time;

pub use cache::TtlCache;
pub use error::{Capability, Error, ErrorContext, ErrorKind, RateLimit, Result};
pub use geometry::{Point, Polygon, Rect, Segment};
pub use ids::{LightId, RegionId, TokenId, WallId};
pub use state::{CoverState, IlluminationLevel, VisibilityState};
pub use time::{Clock, ManualClock, Millis, SystemClock};

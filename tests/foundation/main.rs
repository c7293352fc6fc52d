//! Integration tests for Layer 0: Foundation
//!
//! Tests for geometry, state ladders, time, and the TTL cache.

mod geometry;
mod time_and_cache;

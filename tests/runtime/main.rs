//! Integration tests for Layer 3: Runtime
//!
//! Tests for the orchestrator lifecycle, scheduling, overrides, degradation,
//! and persistence.

mod degradation;
mod lifecycle;
mod overrides;
mod persistence;

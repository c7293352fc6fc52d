//! Event-driven orchestration and persistence for Sightline.
//!
//! This crate provides:
//! - [`Orchestrator`] - Keeps stored visibility and cover in step with world events
//! - [`EventHub`] - Subscription and dispatch of [`WorldEvent`]s
//! - [`Scheduler`] and [`CircuitBreaker`] - Deterministic throttle, debounce, and load caps
//! - [`EngineConfig`] - Tuning with presets
//! - [`DiagnosticLog`] - Bounded record of degraded results
//! - Snapshot serialization of overrides and stored relationships

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod breaker;
pub mod config;
pub mod diagnostics;
pub mod events;
pub mod orchestrator;
pub mod scheduler;
pub mod serialize;

pub use breaker::CircuitBreaker;
pub use config::{EngineConfig, SchedulingConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLog};
pub use events::{
    ActionKind, ActionOutcome, ChangeKind, EventHub, EventKind, SubscriptionId, WorldEvent,
};
pub use orchestrator::{
    Orchestrator, OrchestratorStats, PerceptionRefresh, RecomputeSummary, SkipReason,
};
pub use scheduler::{Scheduler, TaskKey};
pub use serialize::{PersistedState, from_bytes, load_from_file, save_to_file, to_bytes};

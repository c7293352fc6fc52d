//! Configuration for the relationship orchestrator.

use serde::{Deserialize, Serialize};

use sightline_engine::{CoverConfig, LightingConfig, RetryPolicy, VisionConfig};

/// Timing and load limits for event-driven recomputation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Delay before a throttled single-token recompute runs.
    pub token_throttle_ms: u64,
    /// Quiet period before a debounced whole-scene recompute runs.
    pub scene_debounce_ms: u64,
    /// Full recomputations allowed per breaker window.
    pub breaker_limit: u32,
    /// Breaker window length.
    pub breaker_window_ms: u64,
    /// Movement below this many grid squares is ignored.
    pub movement_threshold_squares: f64,
    /// At most this many tokens take part in a recompute.
    pub max_tokens: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            token_throttle_ms: 50,
            scene_debounce_ms: 500,
            breaker_limit: 3,
            breaker_window_ms: 10_000,
            movement_threshold_squares: 0.5,
            max_tokens: 100,
        }
    }
}

impl SchedulingConfig {
    /// Builder method to set the per-token throttle delay.
    #[must_use]
    pub fn with_token_throttle(mut self, ms: u64) -> Self {
        self.token_throttle_ms = ms;
        self
    }

    /// Builder method to set the scene debounce delay.
    #[must_use]
    pub fn with_scene_debounce(mut self, ms: u64) -> Self {
        self.scene_debounce_ms = ms;
        self
    }

    /// Builder method to set the circuit breaker.
    #[must_use]
    pub fn with_breaker(mut self, limit: u32, window_ms: u64) -> Self {
        self.breaker_limit = limit;
        self.breaker_window_ms = window_ms;
        self
    }

    /// Builder method to set the token cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }
}

/// Everything the orchestrator can be tuned with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether the orchestrator reacts to events at all.
    pub enabled: bool,
    /// Also compute and store cover during recomputes.
    pub auto_cover: bool,
    /// Lighting tuning.
    pub lighting: LightingConfig,
    /// Vision tuning.
    pub vision: VisionConfig,
    /// Cover tuning.
    pub cover: CoverConfig,
    /// Throttle, debounce, breaker, and caps.
    pub scheduling: SchedulingConfig,
    /// Backoff for re-probing failed capabilities.
    pub retry: RetryPolicy,
    /// Diagnostics ring buffer size.
    pub diagnostics_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_cover: false,
            lighting: LightingConfig::default(),
            vision: VisionConfig::default(),
            cover: CoverConfig::default(),
            scheduling: SchedulingConfig::default(),
            retry: RetryPolicy::default(),
            diagnostics_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Visibility only, with default tuning.
    #[must_use]
    pub fn visibility_only() -> Self {
        Self::default()
    }

    /// Visibility and cover.
    #[must_use]
    pub fn with_cover_tracking() -> Self {
        Self {
            auto_cover: true,
            ..Self::default()
        }
    }

    /// Zero delays and no breaker, for driving the orchestrator by hand.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            scheduling: SchedulingConfig {
                token_throttle_ms: 0,
                scene_debounce_ms: 0,
                breaker_limit: u32::MAX,
                ..SchedulingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Builder method to set enabled state.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to toggle cover recomputation.
    #[must_use]
    pub fn with_auto_cover(mut self, auto_cover: bool) -> Self {
        self.auto_cover = auto_cover;
        self
    }

    /// Builder method to set lighting tuning.
    #[must_use]
    pub fn with_lighting(mut self, lighting: LightingConfig) -> Self {
        self.lighting = lighting;
        self
    }

    /// Builder method to set vision tuning.
    #[must_use]
    pub fn with_vision(mut self, vision: VisionConfig) -> Self {
        self.vision = vision;
        self
    }

    /// Builder method to set cover tuning.
    #[must_use]
    pub fn with_cover(mut self, cover: CoverConfig) -> Self {
        self.cover = cover;
        self
    }

    /// Builder method to set scheduling limits.
    #[must_use]
    pub fn with_scheduling(mut self, scheduling: SchedulingConfig) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Builder method to set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder method to set the diagnostics buffer size.
    #[must_use]
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }
}

//! Keeps stored relationships in step with the world.
//!
//! The orchestrator listens for world events, schedules throttled per-token
//! and debounced whole-scene recomputes, and writes visibility (and,
//! optionally, cover) for both directions of every token pair. Public entry
//! points never fail because of computation problems: failures degrade
//! through the fallback tiers and are recorded as diagnostics.
//!
//! # Lifecycle
//!
//! ```text
//! disabled ──enable()──▶ enabled + listening ──disable()──▶ disabled
//!                              │
//!                    dialog open ▼ ▲ last dialog closed (flush)
//!                             paused
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use sightline_engine::{
    CapabilityHealth, CoverDetector, CoverOptions, HostVisibility, IntersectionMode,
    OverrideManager, Resolved, VisibilityCalculator, requirements_hold, resolve_with_fallback,
};
use sightline_foundation::{
    Capability, Clock, CoverState, Error, ErrorKind, Millis, Point, Result, TokenId,
    VisibilityState,
};
use sightline_storage::{
    FlagStore, OverrideRecord, OverrideSource, PairKey, RelationshipStore, Scene,
};

use crate::breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticKind, DiagnosticLog};
use crate::events::{ActionOutcome, EventHub, EventKind, SubscriptionId, WorldEvent};
use crate::scheduler::{Scheduler, TaskKey};

// =============================================================================
// Results
// =============================================================================

/// Why a recompute did not run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The orchestrator is disabled.
    Disabled,
    /// A blocking configuration dialog is open.
    Paused,
    /// The circuit breaker is open.
    BreakerOpen,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Paused => f.write_str("paused"),
            Self::BreakerOpen => f.write_str("circuit breaker open"),
        }
    }
}

/// What one recompute did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecomputeSummary {
    /// Directions evaluated.
    pub pairs: usize,
    /// Visibility writes performed.
    pub written: usize,
    /// Directions whose stored visibility already matched.
    pub unchanged: usize,
    /// Directions suppressed by an override.
    pub pinned: usize,
    /// Directions that only produced a fallback value and were not written.
    pub degraded: usize,
    /// Cover writes performed.
    pub cover_written: usize,
    /// Set when the recompute did not run at all.
    pub skipped: Option<SkipReason>,
}

impl RecomputeSummary {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Returns true if the recompute ran.
    #[must_use]
    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }

    /// Visibility and cover writes together.
    #[must_use]
    pub fn total_writes(&self) -> usize {
        self.written + self.cover_written
    }
}

/// Running counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Events handled while enabled.
    pub events: u64,
    /// Whole-scene recomputes that ran.
    pub full_recomputes: u64,
    /// Single-token recomputes that ran.
    pub token_recomputes: u64,
    /// Whole-scene recomputes refused by the breaker.
    pub breaker_drops: u64,
    /// Store writes performed.
    pub writes: u64,
    /// Perception refresh signals issued.
    pub refreshes: u64,
}

/// Receives one coalesced signal after each recompute.
pub trait PerceptionRefresh {
    /// Called once per recompute that ran.
    fn refresh(&mut self, summary: &RecomputeSummary);
}

impl<T: FnMut(&RecomputeSummary)> PerceptionRefresh for T {
    fn refresh(&mut self, summary: &RecomputeSummary) {
        self(summary);
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Event-driven owner of the visibility and cover services.
pub struct Orchestrator<R: RelationshipStore, F: FlagStore> {
    config: EngineConfig,
    clock: Rc<dyn Clock>,
    enabled: bool,
    subscription: Option<SubscriptionId>,
    calculator: VisibilityCalculator,
    cover: CoverDetector,
    overrides: OverrideManager<F>,
    store: R,
    scheduler: Scheduler<TaskKey>,
    breaker: CircuitBreaker,
    health: CapabilityHealth,
    diagnostics: DiagnosticLog,
    open_dialogs: BTreeSet<String>,
    stats: OrchestratorStats,
    refresh: Option<Box<dyn PerceptionRefresh>>,
}

impl<R: RelationshipStore, F: FlagStore> fmt::Debug for Orchestrator<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("enabled", &self.enabled)
            .field("listening", &self.subscription.is_some())
            .field("pending", &self.scheduler.len())
            .field("open_dialogs", &self.open_dialogs)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<R: RelationshipStore, F: FlagStore> Orchestrator<R, F> {
    /// Creates an orchestrator. It does not listen until [`Orchestrator::enable`].
    pub fn new(config: EngineConfig, clock: Rc<dyn Clock>, store: R, flags: F) -> Self {
        let calculator = VisibilityCalculator::new(
            config.lighting.clone(),
            config.vision.clone(),
            Rc::clone(&clock),
        );
        let breaker = CircuitBreaker::new(
            config.scheduling.breaker_limit,
            config.scheduling.breaker_window_ms,
        );
        Self {
            enabled: config.enabled,
            subscription: None,
            calculator,
            cover: CoverDetector::new(config.cover.clone()),
            overrides: OverrideManager::new(flags, Rc::clone(&clock)),
            store,
            scheduler: Scheduler::new(),
            breaker,
            health: CapabilityHealth::new(config.retry.clone()),
            diagnostics: DiagnosticLog::new(config.diagnostics_capacity),
            open_dialogs: BTreeSet::new(),
            stats: OrchestratorStats::default(),
            refresh: None,
            clock,
            config,
        }
    }

    /// Builder method to plug in a host visibility test.
    #[must_use]
    pub fn with_host(mut self, host: Box<dyn HostVisibility>) -> Self {
        self.calculator = self.calculator.with_host(host);
        self
    }

    /// Builder method to receive refresh signals.
    #[must_use]
    pub fn with_refresh(mut self, sink: impl PerceptionRefresh + 'static) -> Self {
        self.refresh = Some(Box::new(sink));
        self
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Enables the orchestrator and subscribes to every event kind.
    pub fn enable(&mut self, hub: &mut EventHub) {
        self.enabled = true;
        if self.subscription.is_none() {
            self.subscription = Some(hub.subscribe(EventKind::ALL));
            tracing::info!("relationship orchestrator listening");
        }
    }

    /// Disables the orchestrator, unsubscribes, and drops every pending task.
    pub fn disable(&mut self, hub: &mut EventHub) {
        self.enabled = false;
        if let Some(id) = self.subscription.take() {
            hub.unsubscribe(id);
        }
        let dropped = self.scheduler.cancel_all();
        self.breaker.reset();
        self.open_dialogs.clear();
        tracing::info!(dropped, "relationship orchestrator disabled");
    }

    /// Returns true if enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns true if subscribed to a hub.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    /// Returns true while a blocking configuration dialog is open.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        !self.open_dialogs.is_empty()
    }

    /// Handles queued events, then runs whatever is due.
    pub fn pump(&mut self, hub: &mut EventHub, scene: &Scene) -> Vec<RecomputeSummary> {
        if let Some(id) = self.subscription {
            for event in hub.drain(id) {
                self.handle_event(scene, &event);
            }
        }
        self.run_due(scene)
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Reacts to one event. `scene` is the snapshot after the change.
    pub fn handle_event(&mut self, scene: &Scene, event: &WorldEvent) {
        if !self.enabled {
            return;
        }
        self.stats.events += 1;
        tracing::trace!(kind = ?event.kind(), "handling world event");

        match event {
            WorldEvent::TokenMoved { id, from, to } => self.on_token_moved(scene, id, *from, *to),
            WorldEvent::TokenCreated(id) => self.throttle_token(id),
            WorldEvent::TokenDeleted(id) => self.on_token_deleted(id),
            WorldEvent::TokenLightChanged(_)
            | WorldEvent::LightChanged { .. }
            | WorldEvent::SceneDarknessChanged
            | WorldEvent::SceneConfigChanged => {
                self.calculator.lighting().invalidate_light_cache();
                self.debounce_scene();
            }
            WorldEvent::WallChanged { .. } | WorldEvent::RegionChanged { .. } => {
                self.debounce_scene();
            }
            WorldEvent::ActorChanged(id) => {
                self.calculator.vision().invalidate_vision_cache(Some(id));
                self.throttle_token(id);
            }
            WorldEvent::ConfigDialogOpened(name) => {
                if self.open_dialogs.insert(name.clone()) {
                    tracing::debug!(dialog = %name, "updates paused");
                }
            }
            WorldEvent::ConfigDialogClosed(name) => {
                if self.open_dialogs.remove(name) && self.open_dialogs.is_empty() {
                    tracing::debug!(dialog = %name, "updates resumed, flushing");
                    self.debounce_scene();
                }
            }
            WorldEvent::Action(outcome) => {
                if let Err(e) = self.apply_action_outcome(outcome) {
                    tracing::warn!(
                        observer = %outcome.observer,
                        target = %outcome.target,
                        error = %e,
                        "failed to apply action outcome"
                    );
                    self.diagnostics.push(
                        self.clock.now(),
                        DiagnosticKind::WriteFailed,
                        e.to_string(),
                    );
                }
            }
        }
    }

    fn on_token_moved(&mut self, scene: &Scene, id: &TokenId, from: Point, to: Point) {
        let lit = scene.token(id).is_some_and(|t| t.light_source().is_some());
        if lit {
            self.calculator.lighting().invalidate_light_cache();
        }
        let threshold = self.config.scheduling.movement_threshold_squares * scene.grid.size_px;
        let distance = from.distance(to);
        if distance < threshold {
            tracing::trace!(token = %id, distance, threshold, "ignoring small move");
            return;
        }
        self.validate_overrides(scene, id);
        self.throttle_token(id);
        if lit {
            self.debounce_scene();
        }
    }

    fn on_token_deleted(&mut self, id: &TokenId) {
        self.scheduler.cancel(&TaskKey::TokenRecompute(id.clone()));
        self.store.forget_token(id);
        self.calculator.vision().invalidate_vision_cache(Some(id));
        self.calculator.lighting().invalidate_light_cache();
        match self.overrides.clear_all_overrides(Some(id)) {
            Ok(removed) => tracing::debug!(token = %id, removed, "token deleted"),
            Err(e) => {
                tracing::warn!(token = %id, error = %e, "failed to clear overrides of deleted token");
                self.diagnostics
                    .push(self.clock.now(), DiagnosticKind::WriteFailed, e.to_string());
            }
        }
    }

    /// Clears overrides involving `token` whose requirements no longer hold.
    fn validate_overrides(&mut self, scene: &Scene, token: &TokenId) {
        for record in self.overrides.overrides_involving(token) {
            if !record.requires_cover && !record.requires_concealment {
                continue;
            }
            let options = self.cover_options(scene, &record.observer);
            let cover = match self
                .cover
                .try_detect(scene, &record.observer, &record.target, &options)
            {
                Ok(report) => report.result,
                Err(e) => {
                    tracing::debug!(error = %e, "cannot validate override, keeping it");
                    continue;
                }
            };
            let visibility = match self.calculator.automatic_visibility(
                scene,
                &record.observer,
                &record.target,
            ) {
                Ok(outcome) => outcome.state,
                Err(e) => {
                    tracing::debug!(error = %e, "cannot validate override, keeping it");
                    continue;
                }
            };
            if requirements_hold(&record, cover, visibility) {
                continue;
            }

            tracing::info!(
                observer = %record.observer,
                target = %record.target,
                source = %record.source,
                %cover,
                %visibility,
                "override requirements no longer hold"
            );
            match self.overrides.remove_override(&record.observer, &record.target) {
                Ok(_) => {
                    self.diagnostics.push(
                        self.clock.now(),
                        DiagnosticKind::OverrideInvalidated {
                            observer: record.observer.clone(),
                            target: record.target.clone(),
                        },
                        format!("{} override lost its cover or concealment", record.source),
                    );
                    self.throttle_token(&record.target);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to clear invalidated override");
                    self.diagnostics
                        .push(self.clock.now(), DiagnosticKind::WriteFailed, e.to_string());
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    fn throttle_token(&mut self, id: &TokenId) {
        if !self.enabled {
            return;
        }
        let delay = self.config.scheduling.token_throttle_ms;
        if self
            .scheduler
            .schedule(TaskKey::TokenRecompute(id.clone()), self.clock.now(), delay)
        {
            tracing::trace!(token = %id, "token recompute rescheduled");
        }
    }

    fn debounce_scene(&mut self) {
        if !self.enabled {
            return;
        }
        let delay = self.config.scheduling.scene_debounce_ms;
        if self
            .scheduler
            .schedule(TaskKey::SceneRecompute, self.clock.now(), delay)
        {
            tracing::trace!("scene recompute debounced");
        }
    }

    /// Runs every task due now. Nothing runs while disabled or paused.
    pub fn run_due(&mut self, scene: &Scene) -> Vec<RecomputeSummary> {
        if !self.enabled || self.is_paused() {
            return Vec::new();
        }
        let due = self.scheduler.take_due(self.clock.now());
        let scene_due = due.contains(&TaskKey::SceneRecompute);

        let mut summaries = Vec::new();
        for task in due {
            tracing::trace!(%task, "running task");
            match task {
                // The whole-scene pass covers these.
                TaskKey::TokenRecompute(_) if scene_due => {}
                TaskKey::TokenRecompute(id) => summaries.push(self.recalculate_token(scene, &id)),
                TaskKey::SceneRecompute => {
                    summaries.push(self.recalculate_all_visibility(scene, false));
                }
                TaskKey::Probe(capability) => self.probe(scene, capability),
            }
        }
        summaries
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Returns true if `task` is pending.
    #[must_use]
    pub fn is_scheduled(&self, task: &TaskKey) -> bool {
        self.scheduler.is_pending(task)
    }

    /// Earliest pending due time.
    #[must_use]
    pub fn next_due(&self) -> Option<Millis> {
        self.scheduler.next_due()
    }

    // -------------------------------------------------------------------------
    // Capability health
    // -------------------------------------------------------------------------

    fn probe(&mut self, scene: &Scene, capability: Capability) {
        let result = match capability {
            Capability::Lighting => self
                .calculator
                .lighting()
                .illumination_at(scene, Point::new(0.0, 0.0))
                .map(|_| ()),
            Capability::Cover => scene.validate(),
        };
        match result {
            Ok(()) => {
                self.health.mark_healthy(capability);
                self.debounce_scene();
            }
            Err(e) => {
                tracing::debug!(%capability, error = %e, "probe failed");
                self.schedule_retry(capability);
            }
        }
    }

    fn note_failure(&mut self, capability: Capability) {
        if !self.health.is_degraded(capability) {
            self.schedule_retry(capability);
        }
    }

    fn schedule_retry(&mut self, capability: Capability) {
        let now = self.clock.now();
        match self.health.mark_failed(capability, now) {
            Ok(delay_ms) => {
                self.scheduler
                    .schedule_if_idle(TaskKey::Probe(capability), now, delay_ms);
                tracing::info!(%capability, delay_ms, "capability degraded, probe scheduled");
                self.diagnostics.push(
                    now,
                    DiagnosticKind::RetryScheduled {
                        capability,
                        delay_ms,
                    },
                    format!("re-probing {capability} in {delay_ms}ms"),
                );
            }
            Err(e) => {
                tracing::warn!(%capability, error = %e, "retries exhausted, fallback stays in effect");
                self.diagnostics.push(
                    now,
                    DiagnosticKind::RetryExhausted(capability),
                    e.to_string(),
                );
            }
        }
    }

    fn record_resolution<T>(
        &mut self,
        capability: Capability,
        systemic: Option<Capability>,
        resolved: &Resolved<T>,
    ) {
        if !resolved.is_degraded() {
            if self.health.is_degraded(capability) {
                self.health.mark_healthy(capability);
                self.scheduler.cancel(&TaskKey::Probe(capability));
            }
            return;
        }
        tracing::debug!(
            %capability,
            tier = %resolved.tier,
            explanation = %resolved.explanation,
            "degraded result"
        );
        self.diagnostics.push(
            self.clock.now(),
            DiagnosticKind::Fallback {
                capability,
                tier: resolved.tier,
            },
            resolved.explanation.clone(),
        );
        if let Some(failed) = systemic {
            self.note_failure(failed);
        }
    }

    /// The retry state of each capability.
    #[must_use]
    pub fn health(&self) -> &CapabilityHealth {
        &self.health
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Visibility of `target` to `observer`, degrading instead of failing.
    ///
    /// Tiers: full calculation, line of sight only, stored value, observed.
    pub fn calculate_visibility(
        &mut self,
        scene: &Scene,
        observer: &TokenId,
        target: &TokenId,
    ) -> Resolved<VisibilityState> {
        let check = self.overrides.check_all_overrides(observer, target);
        let primary = self
            .calculator
            .calculate(scene, observer, target, &check)
            .map(|outcome| outcome.state);
        let systemic = primary
            .as_ref()
            .err()
            .and_then(|e| systemic_capability(e, Capability::Lighting));

        let key = PairKey::new(observer.clone(), target.clone());
        let calculator = &self.calculator;
        let store = &self.store;
        let resolved = resolve_with_fallback(
            move || primary,
            || calculator.approximate(scene, observer, target),
            || store.visibility(&key),
            VisibilityState::Observed,
        );
        self.record_resolution(Capability::Lighting, systemic, &resolved);
        resolved
    }

    /// Cover of `target` against `observer`, degrading instead of failing.
    ///
    /// Cover pinned by an override applies unless `options` already carries
    /// a manual value. Tiers: full detection, walls only, stored value, none.
    pub fn detect_cover_between_tokens(
        &mut self,
        scene: &Scene,
        observer: &TokenId,
        target: &TokenId,
        options: &CoverOptions,
    ) -> Resolved<CoverState> {
        let mut options = options.clone();
        options
            .undetected
            .extend(self.undetected_by(scene, observer));
        if options.manual_override.is_none() {
            if let Some(cover) = self.overrides.get(observer, target).and_then(|r| r.cover) {
                options = options.with_manual_override(cover);
            }
        }
        let primary = self
            .cover
            .try_detect(scene, observer, target, &options)
            .map(|report| report.result);
        let systemic = primary
            .as_ref()
            .err()
            .and_then(|e| systemic_capability(e, Capability::Cover));

        let key = PairKey::new(observer.clone(), target.clone());
        let detector = &self.cover;
        let store = &self.store;
        let resolved = resolve_with_fallback(
            move || primary,
            || {
                let attacker = scene.require_token(observer)?;
                let defender = scene.require_token(target)?;
                Ok(detector.wall_cover(scene, attacker, defender, IntersectionMode::Any))
            },
            || store.cover(&key),
            CoverState::None,
        );
        self.record_resolution(Capability::Cover, systemic, &resolved);
        resolved
    }

    // -------------------------------------------------------------------------
    // Recompute
    // -------------------------------------------------------------------------

    /// Recomputes every pair among the first `max_tokens` tokens.
    ///
    /// Without `force` the call is subject to the pause and the circuit
    /// breaker. With `force` both are bypassed and exhausted capabilities get
    /// a fresh retry budget.
    pub fn recalculate_all_visibility(&mut self, scene: &Scene, force: bool) -> RecomputeSummary {
        if !self.enabled {
            tracing::debug!("recompute skipped: disabled");
            return RecomputeSummary::skipped(SkipReason::Disabled);
        }
        if self.is_paused() && !force {
            tracing::debug!("recompute skipped: paused");
            return RecomputeSummary::skipped(SkipReason::Paused);
        }

        let now = self.clock.now();
        if force {
            self.health.reset();
            for capability in [Capability::Lighting, Capability::Cover] {
                self.scheduler.cancel(&TaskKey::Probe(capability));
            }
        } else if let Err(limit) = self.breaker.try_acquire(now) {
            self.stats.breaker_drops += 1;
            self.diagnostics
                .push(now, DiagnosticKind::BreakerTripped, limit.to_string());
            return RecomputeSummary::skipped(SkipReason::BreakerOpen);
        }

        let ids = self.participants(scene);
        let mut summary = RecomputeSummary::default();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                self.recompute_direction(scene, a, b, &mut summary);
                self.recompute_direction(scene, b, a, &mut summary);
            }
        }

        self.stats.full_recomputes += 1;
        tracing::info!(
            tokens = ids.len(),
            pairs = summary.pairs,
            written = summary.written,
            unchanged = summary.unchanged,
            pinned = summary.pinned,
            degraded = summary.degraded,
            "full recompute finished"
        );
        self.finish(summary)
    }

    /// Recomputes both directions between `id` and every other participant.
    pub fn recalculate_token(&mut self, scene: &Scene, id: &TokenId) -> RecomputeSummary {
        if !self.enabled {
            return RecomputeSummary::skipped(SkipReason::Disabled);
        }
        if self.is_paused() {
            return RecomputeSummary::skipped(SkipReason::Paused);
        }
        if scene.token(id).is_none() {
            tracing::debug!(token = %id, "token gone, nothing to recompute");
            return RecomputeSummary::default();
        }

        let mut summary = RecomputeSummary::default();
        for other in self.participants(scene) {
            if other == *id {
                continue;
            }
            self.recompute_direction(scene, id, &other, &mut summary);
            self.recompute_direction(scene, &other, id, &mut summary);
        }

        self.stats.token_recomputes += 1;
        tracing::debug!(token = %id, pairs = summary.pairs, written = summary.written, "token recompute finished");
        self.finish(summary)
    }

    fn participants(&self, scene: &Scene) -> Vec<TokenId> {
        let max = self.config.scheduling.max_tokens;
        let count = scene.token_count();
        if count > max {
            tracing::warn!(count, max, "token cap reached, recomputing a subset");
        }
        scene.tokens().take(max).map(|t| t.id.clone()).collect()
    }

    fn recompute_direction(
        &mut self,
        scene: &Scene,
        observer: &TokenId,
        target: &TokenId,
        summary: &mut RecomputeSummary,
    ) {
        summary.pairs += 1;
        let key = PairKey::new(observer.clone(), target.clone());
        let check = self.overrides.check_all_overrides(observer, target);

        if check.seek.is_some() || check.sneak.is_some() {
            summary.pinned += 1;
            // Invisible targets clamp the pinned state.
            let pinned = self.calculate_visibility(scene, observer, target);
            if !pinned.is_degraded() && self.store.visibility(&key) != Some(pinned.value) {
                self.write_visibility(key.clone(), pinned.value, summary);
            }
            if self.config.auto_cover {
                if let Some(cover) = check.pinned_cover() {
                    self.write_cover(key, cover, summary);
                }
            }
            return;
        }

        let visibility = self.calculate_visibility(scene, observer, target);
        if visibility.is_degraded() {
            summary.degraded += 1;
        } else if self.store.visibility(&key) == Some(visibility.value) {
            summary.unchanged += 1;
        } else {
            self.write_visibility(key.clone(), visibility.value, summary);
        }

        if self.config.auto_cover {
            let options = self.cover.default_options();
            let cover = self.detect_cover_between_tokens(scene, observer, target, &options);
            if !cover.is_degraded() {
                self.write_cover(key, cover.value, summary);
            }
        }
    }

    /// Tokens `observer` cannot detect, by override or stored visibility.
    fn undetected_by(&mut self, scene: &Scene, observer: &TokenId) -> Vec<TokenId> {
        let mut undetected = Vec::new();
        for token in scene.tokens() {
            if token.id == *observer {
                continue;
            }
            let pinned = self
                .overrides
                .get(observer, &token.id)
                .filter(|r| r.source != OverrideSource::PointOut)
                .map(|r| r.state);
            let state = pinned.or_else(|| {
                self.store
                    .visibility(&PairKey::new(observer.clone(), token.id.clone()))
            });
            if state == Some(VisibilityState::Undetected) {
                undetected.push(token.id.clone());
            }
        }
        undetected
    }

    fn cover_options(&mut self, scene: &Scene, observer: &TokenId) -> CoverOptions {
        let mut options = self.cover.default_options();
        options.undetected.extend(self.undetected_by(scene, observer));
        options
    }

    fn write_visibility(
        &mut self,
        key: PairKey,
        state: VisibilityState,
        summary: &mut RecomputeSummary,
    ) {
        match self.store.set_visibility(key, state) {
            Ok(()) => {
                summary.written += 1;
                self.stats.writes += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "visibility write failed");
                self.diagnostics
                    .push(self.clock.now(), DiagnosticKind::WriteFailed, e.to_string());
            }
        }
    }

    fn write_cover(&mut self, key: PairKey, cover: CoverState, summary: &mut RecomputeSummary) {
        if self.store.cover(&key) == Some(cover) {
            return;
        }
        match self.store.set_cover(key, cover) {
            Ok(()) => {
                summary.cover_written += 1;
                self.stats.writes += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cover write failed");
                self.diagnostics
                    .push(self.clock.now(), DiagnosticKind::WriteFailed, e.to_string());
            }
        }
    }

    fn finish(&mut self, summary: RecomputeSummary) -> RecomputeSummary {
        if let Some(sink) = self.refresh.as_mut() {
            sink.refresh(&summary);
        }
        self.stats.refreshes += 1;
        summary
    }

    // -------------------------------------------------------------------------
    // Overrides
    // -------------------------------------------------------------------------

    /// Stores an override and writes the state it pins.
    ///
    /// Point-out overrides pin nothing on their own; the target is queued
    /// for recompute instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag or relationship store rejects a write.
    pub fn apply_override(&mut self, record: OverrideRecord) -> Result<()> {
        let key = PairKey::new(record.observer.clone(), record.target.clone());
        let target = record.target.clone();
        let source = record.source;
        let state = record.state;
        let cover = record.cover;
        self.overrides.apply_override(record)?;

        if source == OverrideSource::PointOut {
            self.throttle_token(&target);
            return Ok(());
        }
        if self.store.visibility(&key) != Some(state) {
            self.store.set_visibility(key.clone(), state)?;
            self.stats.writes += 1;
        }
        if let Some(cover) = cover {
            if self.store.cover(&key) != Some(cover) {
                self.store.set_cover(key, cover)?;
                self.stats.writes += 1;
            }
        }
        Ok(())
    }

    /// Removes the override for one direction and queues the target for
    /// recompute. Returns true if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag store rejects the removal.
    pub fn remove_override(&mut self, observer: &TokenId, target: &TokenId) -> Result<bool> {
        let removed = self.overrides.remove_override(observer, target)?;
        if removed {
            self.throttle_token(target);
        }
        Ok(removed)
    }

    /// Removes every override involving `token`, or all overrides.
    ///
    /// # Errors
    ///
    /// Returns the first error from the flag store.
    pub fn clear_all_overrides(&mut self, token: Option<&TokenId>) -> Result<usize> {
        let removed = self.overrides.clear_all_overrides(token)?;
        if removed > 0 {
            self.debounce_scene();
        }
        Ok(removed)
    }

    /// Creates or clears an override from a narrative action result.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::apply_override`].
    pub fn apply_action_outcome(&mut self, outcome: &ActionOutcome) -> Result<()> {
        match outcome.to_record(self.clock.now()) {
            Some(record) => self.apply_override(record),
            None => self
                .remove_override(&outcome.observer, &outcome.target)
                .map(|_| ()),
        }
    }

    /// The override manager.
    pub fn overrides(&mut self) -> &mut OverrideManager<F> {
        &mut self.overrides
    }

    // -------------------------------------------------------------------------
    // Caches and accessors
    // -------------------------------------------------------------------------

    /// Drops the cached token light scan.
    pub fn invalidate_light_cache(&mut self) {
        self.calculator.lighting().invalidate_light_cache();
    }

    /// Drops cached vision capabilities for one token, or all.
    pub fn invalidate_vision_cache(&mut self, token: Option<&TokenId>) {
        self.calculator.vision().invalidate_vision_cache(token);
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The relationship store.
    #[must_use]
    pub fn store(&self) -> &R {
        &self.store
    }

    /// Recorded diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Running counters.
    #[must_use]
    pub fn stats(&self) -> &OrchestratorStats {
        &self.stats
    }

    /// Consumes the orchestrator, returning both stores.
    pub fn into_stores(self) -> (R, F) {
        (self.store, self.overrides.into_store())
    }
}

/// The capability a failure takes down, if it is systemic.
fn systemic_capability(error: &Error, fallback: Capability) -> Option<Capability> {
    match &error.kind {
        ErrorKind::CapabilityUnavailable(capability) => Some(*capability),
        ErrorKind::InvalidScene(_) => Some(fallback),
        _ => None,
    }
}

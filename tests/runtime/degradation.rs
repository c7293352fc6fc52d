//! Integration tests for fallback tiers and capability retries

use sightline_engine::{CoverOptions, FallbackTier};
use sightline_foundation::{Capability, CoverState, Millis, VisibilityState};
use sightline_runtime::{EngineConfig, TaskKey};

use crate::support::{id, orchestrator, three_tokens};

#[test]
fn lighting_failure_backs_off_then_gives_up() {
    let (clock, mut o) = orchestrator(EngineConfig::default());
    let broken = three_tokens().with_darkness(f64::NAN);

    let resolved = o.calculate_visibility(&broken, &id("a"), &id("b"));
    assert_eq!(resolved.tier, FallbackTier::Approximation);
    assert_eq!(resolved.value, VisibilityState::Observed);
    assert!(!resolved.explanation.is_empty());
    assert_eq!(o.next_due(), Some(Millis(1_000)));

    clock.advance(1_000);
    o.run_due(&broken);
    assert_eq!(o.next_due(), Some(Millis(3_000)));

    clock.advance(2_000);
    o.run_due(&broken);
    assert_eq!(o.next_due(), Some(Millis(7_000)));

    clock.advance(4_000);
    o.run_due(&broken);
    assert!(o.health().is_exhausted(Capability::Lighting));
    assert_eq!(o.pending_tasks(), 0);
    assert_eq!(o.diagnostics().by_kind("retry").len(), 3);
    assert_eq!(o.diagnostics().by_kind("retry-exhausted").len(), 1);

    // Further failures do not restart the retry cycle.
    o.calculate_visibility(&broken, &id("a"), &id("c"));
    assert_eq!(o.pending_tasks(), 0);
}

#[test]
fn successful_probe_recovers_and_queues_a_scene_pass() {
    let (clock, mut o) = orchestrator(EngineConfig::default());
    let scene = three_tokens();
    o.calculate_visibility(&scene.with_darkness(f64::NAN), &id("a"), &id("b"));
    assert!(o.health().is_degraded(Capability::Lighting));

    clock.advance(1_000);
    o.run_due(&scene);

    assert!(!o.health().is_degraded(Capability::Lighting));
    assert!(o.is_scheduled(&TaskKey::SceneRecompute));
}

#[test]
fn forced_recompute_restores_exhausted_capabilities() {
    let (clock, mut o) = orchestrator(EngineConfig::default());
    let scene = three_tokens();
    let broken = scene.with_darkness(f64::NAN);
    o.calculate_visibility(&broken, &id("a"), &id("b"));
    for delay in [1_000, 2_000, 4_000] {
        clock.advance(delay);
        o.run_due(&broken);
    }
    assert!(o.health().is_exhausted(Capability::Lighting));

    let summary = o.recalculate_all_visibility(&scene, true);
    assert!(summary.ran());
    assert_eq!(summary.written, 6);
    assert!(!o.health().is_degraded(Capability::Lighting));
}

#[test]
fn missing_token_falls_back_to_the_stored_value() {
    let (_, mut o) = orchestrator(EngineConfig::immediate());
    let scene = three_tokens();
    o.recalculate_all_visibility(&scene, false);

    let without_b = scene.without_token(&id("b"));
    let stored = o.calculate_visibility(&without_b, &id("a"), &id("b"));
    assert_eq!(stored.tier, FallbackTier::StoredManual);
    assert_eq!(stored.value, VisibilityState::Observed);

    let unknown = o.calculate_visibility(&without_b, &id("a"), &id("ghost"));
    assert_eq!(unknown.tier, FallbackTier::Constant);
    assert_eq!(unknown.value, VisibilityState::Observed);

    // Missing tokens are not a capability failure.
    assert!(!o.health().is_degraded(Capability::Lighting));
}

#[test]
fn broken_scene_cover_uses_walls_only() {
    let (_, mut o) = orchestrator(EngineConfig::default());
    let broken = three_tokens().with_darkness(f64::NAN);

    let resolved =
        o.detect_cover_between_tokens(&broken, &id("a"), &id("c"), &CoverOptions::default());

    assert_eq!(resolved.tier, FallbackTier::Approximation);
    assert_eq!(resolved.value, CoverState::None);
    assert!(o.health().is_degraded(Capability::Cover));
    assert!(o.is_scheduled(&TaskKey::Probe(Capability::Cover)));
}

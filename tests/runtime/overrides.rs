//! Integration tests for overrides driven through the orchestrator

use sightline_foundation::{CoverState, Point, VisibilityState};
use sightline_runtime::{
    ActionKind, ActionOutcome, EngineConfig, EventHub, TaskKey, WorldEvent,
};
use sightline_storage::{RelationshipStore, Scene, Wall};

use crate::support::{id, key, moved, orchestrator, three_tokens, token};

/// A guard and a rogue on either side of a wall.
fn ambush() -> Scene {
    Scene::default()
        .with_token(token("guard", 50.0, 50.0))
        .with_token(token("rogue", 950.0, 50.0))
        .with_wall(Wall::solid(
            "w",
            Point::new(500.0, -300.0),
            Point::new(500.0, 300.0),
        ))
}

fn hide() -> ActionOutcome {
    ActionOutcome::new(ActionKind::Hide, "guard", "rogue", VisibilityState::Hidden)
        .requiring(true, false)
}

#[test]
fn sneak_result_survives_recompute() {
    let (_, mut o) = orchestrator(EngineConfig::immediate());
    let mut hub = EventHub::new();
    let scene = three_tokens();
    o.enable(&mut hub);

    hub.publish(WorldEvent::Action(ActionOutcome::new(
        ActionKind::Sneak,
        "a",
        "b",
        VisibilityState::Undetected,
    )));
    o.pump(&mut hub, &scene);
    assert_eq!(
        o.store().visibility(&key("a", "b")),
        Some(VisibilityState::Undetected)
    );

    let summary = o.recalculate_all_visibility(&scene, false);
    assert_eq!(summary.pinned, 1);
    assert_eq!(
        o.store().visibility(&key("a", "b")),
        Some(VisibilityState::Undetected)
    );
}

#[test]
fn cleared_result_recomputes_the_target() {
    let (_, mut o) = orchestrator(EngineConfig::immediate());
    let mut hub = EventHub::new();
    let scene = three_tokens();
    o.enable(&mut hub);

    hub.publish(WorldEvent::Action(ActionOutcome::new(
        ActionKind::Sneak,
        "a",
        "b",
        VisibilityState::Undetected,
    )));
    hub.publish(WorldEvent::Action(ActionOutcome::new(
        ActionKind::Cleared,
        "a",
        "b",
        VisibilityState::Observed,
    )));
    let ran = o.pump(&mut hub, &scene);

    assert_eq!(ran.len(), 1);
    assert!(o.overrides().get(&id("a"), &id("b")).is_none());
    assert_eq!(
        o.store().visibility(&key("a", "b")),
        Some(VisibilityState::Observed)
    );
}

#[test]
fn expired_result_stops_pinning() {
    let (clock, mut o) = orchestrator(EngineConfig::immediate());
    let scene = three_tokens();
    o.apply_action_outcome(
        &ActionOutcome::new(ActionKind::Sneak, "a", "b", VisibilityState::Undetected)
            .with_duration(1_000),
    )
    .unwrap();

    assert_eq!(o.recalculate_all_visibility(&scene, false).pinned, 1);

    clock.advance(1_001);
    let summary = o.recalculate_all_visibility(&scene, false);
    assert_eq!(summary.pinned, 0);
    assert_eq!(
        o.store().visibility(&key("a", "b")),
        Some(VisibilityState::Observed)
    );
}

#[test]
fn point_out_queues_the_target_without_pinning() {
    let (_, mut o) = orchestrator(EngineConfig::default());
    o.apply_action_outcome(&ActionOutcome::new(
        ActionKind::PointOut,
        "a",
        "b",
        VisibilityState::Hidden,
    ))
    .unwrap();

    assert!(o.overrides().get(&id("a"), &id("b")).is_some());
    assert!(o.store().visibility(&key("a", "b")).is_none());
    assert!(o.is_scheduled(&TaskKey::TokenRecompute(id("b"))));
}

#[test]
fn pinned_cover_is_written_with_the_override() {
    let (_, mut o) = orchestrator(EngineConfig::immediate().with_auto_cover(true));
    o.apply_action_outcome(&hide().with_cover(CoverState::Greater)).unwrap();

    assert_eq!(
        o.store().visibility(&key("guard", "rogue")),
        Some(VisibilityState::Hidden)
    );
    assert_eq!(
        o.store().cover(&key("guard", "rogue")),
        Some(CoverState::Greater)
    );
}

#[test]
fn leaving_cover_clears_a_hide_that_needs_it() {
    let (_, mut o) = orchestrator(EngineConfig::default());
    let mut hub = EventHub::new();
    o.enable(&mut hub);
    o.apply_action_outcome(&hide()).unwrap();

    let (scene, event) = moved(&ambush(), "rogue", Point::new(950.0, 1_050.0));
    hub.publish(event);
    o.pump(&mut hub, &scene);

    assert!(o.overrides().get(&id("guard"), &id("rogue")).is_none());
    assert_eq!(o.diagnostics().by_kind("override-invalidated").len(), 1);
    assert!(o.is_scheduled(&TaskKey::TokenRecompute(id("rogue"))));
}

#[test]
fn hiding_behind_an_unnoticed_creature_is_not_cover() {
    let (_, mut o) = orchestrator(EngineConfig::default());
    let mut hub = EventHub::new();
    o.enable(&mut hub);
    let scene = Scene::default()
        .with_token(token("guard", 50.0, 50.0))
        .with_token(token("lurker", 550.0, 50.0))
        .with_token(token("rogue", 1_050.0, 50.0));
    o.apply_action_outcome(&ActionOutcome::new(
        ActionKind::Sneak,
        "guard",
        "lurker",
        VisibilityState::Undetected,
    ))
    .unwrap();
    o.apply_action_outcome(&hide()).unwrap();

    let (scene, event) = moved(&scene, "rogue", Point::new(1_150.0, 50.0));
    hub.publish(event);
    o.pump(&mut hub, &scene);

    assert!(o.overrides().get(&id("guard"), &id("rogue")).is_none());
    assert!(o.overrides().get(&id("guard"), &id("lurker")).is_some());
}

#[test]
fn staying_behind_cover_keeps_the_hide() {
    let (_, mut o) = orchestrator(EngineConfig::default());
    let mut hub = EventHub::new();
    o.enable(&mut hub);
    o.apply_action_outcome(&hide()).unwrap();

    let (scene, event) = moved(&ambush(), "rogue", Point::new(950.0, 250.0));
    hub.publish(event);
    o.pump(&mut hub, &scene);

    assert!(o.overrides().get(&id("guard"), &id("rogue")).is_some());
    assert!(o.diagnostics().by_kind("override-invalidated").is_empty());
}

#[test]
fn clearing_everything_queues_a_scene_pass() {
    let (_, mut o) = orchestrator(EngineConfig::default());
    for (observer, target) in [("a", "b"), ("b", "c")] {
        o.apply_action_outcome(&ActionOutcome::new(
            ActionKind::Sneak,
            observer,
            target,
            VisibilityState::Undetected,
        ))
        .unwrap();
    }

    assert_eq!(o.clear_all_overrides(None).unwrap(), 2);
    assert!(o.is_scheduled(&TaskKey::SceneRecompute));
    assert!(o.overrides().all_overrides().is_empty());
}

#[test]
fn deleting_a_token_drops_its_overrides() {
    let (_, mut o) = orchestrator(EngineConfig::immediate());
    let mut hub = EventHub::new();
    o.enable(&mut hub);
    o.apply_action_outcome(&ActionOutcome::new(
        ActionKind::Sneak,
        "a",
        "b",
        VisibilityState::Undetected,
    ))
    .unwrap();

    let scene = three_tokens().without_token(&id("b"));
    hub.publish(WorldEvent::TokenDeleted(id("b")));
    o.pump(&mut hub, &scene);

    assert!(o.overrides().all_overrides().is_empty());
}

#[test]
fn unnoticed_sneaker_gives_no_cover() {
    let (_, mut o) = orchestrator(EngineConfig::immediate().with_auto_cover(true));
    let scene = three_tokens();
    o.apply_action_outcome(&ActionOutcome::new(
        ActionKind::Sneak,
        "a",
        "b",
        VisibilityState::Undetected,
    ))
    .unwrap();

    o.recalculate_all_visibility(&scene, false);
    assert_eq!(o.store().cover(&key("a", "c")), Some(CoverState::None));
    // c still sees b standing in the way.
    assert_eq!(o.store().cover(&key("c", "a")), Some(CoverState::Lesser));
}

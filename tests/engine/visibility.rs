//! Integration tests for per-direction visibility

use std::rc::Rc;

use sightline_engine::{
    LightingConfig, OverrideCheck, VisibilityCalculator, VisibilityReason, VisionConfig,
};
use sightline_foundation::{ErrorKind, ManualClock, Millis, Point, Rect, TokenId, VisibilityState};
use sightline_storage::{
    ActorData, Condition, OverrideRecord, OverrideSource, Scene, Sense, SenseKind, Token, Wall,
};

fn calculator() -> VisibilityCalculator {
    VisibilityCalculator::new(
        LightingConfig::default(),
        VisionConfig::default(),
        Rc::new(ManualClock::new(Millis(0))),
    )
}

fn at(id: &str, x: f64) -> Token {
    Token::new(id, Rect::centered(Point::new(x, 50.0), 100.0, 100.0))
}

fn pair(scene: Scene, observer: Token, target: Token) -> Scene {
    scene.with_token(observer).with_token(target)
}

fn id(s: &str) -> TokenId {
    TokenId::new(s)
}

// =============================================================================
// Lighting scenarios
// =============================================================================

#[test]
fn target_in_darkness_is_hidden_without_darkvision() {
    let scene = pair(Scene::default().with_darkness(1.0), at("human", 50.0), at("orc", 550.0));
    let outcome = calculator()
        .automatic_visibility(&scene, &id("human"), &id("orc"))
        .unwrap();
    assert_eq!(outcome.state, VisibilityState::Hidden);
}

#[test]
fn darkvision_observes_in_darkness() {
    let dwarf = at("dwarf", 50.0)
        .with_actor(ActorData::default().with_sense(Sense::unlimited(SenseKind::Darkvision)));
    let scene = pair(Scene::default().with_darkness(1.0), dwarf, at("orc", 550.0));
    let outcome = calculator()
        .automatic_visibility(&scene, &id("dwarf"), &id("orc"))
        .unwrap();
    assert_eq!(outcome.state, VisibilityState::Observed);
}

#[test]
fn darkvision_out_of_range_does_not_help() {
    // 500px apart is 25ft at the default grid.
    let dwarf = at("dwarf", 50.0)
        .with_actor(ActorData::default().with_sense(Sense::ranged(SenseKind::Darkvision, 10.0)));
    let scene = pair(Scene::default().with_darkness(1.0), dwarf, at("orc", 550.0));
    let outcome = calculator()
        .automatic_visibility(&scene, &id("dwarf"), &id("orc"))
        .unwrap();
    assert_eq!(outcome.state, VisibilityState::Hidden);
}

#[test]
fn blinded_observer_never_sees() {
    let blind = at("blind", 50.0).with_actor(ActorData::default().with_condition(Condition::Blinded));
    let scene = pair(Scene::default(), blind, at("orc", 550.0));
    let outcome = calculator()
        .automatic_visibility(&scene, &id("blind"), &id("orc"))
        .unwrap();
    assert_eq!(outcome.state, VisibilityState::Hidden);
    assert_eq!(outcome.reason, VisibilityReason::Blinded);
}

#[test]
fn walls_block_line_of_sight() {
    let scene = pair(Scene::default(), at("a", 50.0), at("b", 550.0))
        .with_wall(Wall::solid("w", Point::new(300.0, -500.0), Point::new(300.0, 500.0)));
    let outcome = calculator().automatic_visibility(&scene, &id("a"), &id("b")).unwrap();
    assert_eq!(outcome.state, VisibilityState::Hidden);
    assert_eq!(outcome.reason, VisibilityReason::NoLineOfSight);
}

#[test]
fn invisible_target_is_at_most_hidden() {
    let ghost = at("ghost", 550.0).with_actor(ActorData::default().with_condition(Condition::Invisible));
    let scene = pair(Scene::default(), at("a", 50.0), ghost);
    let outcome = calculator().automatic_visibility(&scene, &id("a"), &id("ghost")).unwrap();
    assert!(outcome.state <= VisibilityState::Hidden);
}

#[test]
fn see_invisibility_ignores_invisibility() {
    let seer = at("seer", 50.0)
        .with_actor(ActorData::default().with_sense(Sense::unlimited(SenseKind::SeeInvisibility)));
    let ghost = at("ghost", 550.0).with_actor(ActorData::default().with_condition(Condition::Invisible));
    let scene = pair(Scene::default(), seer, ghost);
    let outcome = calculator().automatic_visibility(&scene, &id("seer"), &id("ghost")).unwrap();
    assert_eq!(outcome.state, VisibilityState::Observed);
}

#[test]
fn missing_token_is_an_error() {
    let scene = Scene::default().with_token(at("a", 50.0));
    let err = calculator().automatic_visibility(&scene, &id("a"), &id("nobody")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TokenNotFound(_)));
}

// =============================================================================
// Override precedence
// =============================================================================

#[test]
fn seek_override_wins_over_darkness_and_invisibility() {
    let ghost = at("ghost", 550.0).with_actor(ActorData::default().with_condition(Condition::Invisible));
    let scene = pair(Scene::default().with_darkness(1.0), at("a", 50.0), ghost);
    let seek = OverrideRecord::new(
        id("a"),
        id("ghost"),
        OverrideSource::Seek,
        VisibilityState::Observed,
        Millis(0),
    );

    let outcome = calculator()
        .calculate(&scene, &id("a"), &id("ghost"), &OverrideCheck::from_record(Some(seek)))
        .unwrap();
    assert_eq!(outcome.state, VisibilityState::Observed);
    assert_eq!(outcome.reason, VisibilityReason::Override(OverrideSource::Seek));
}

#[test]
fn approximation_uses_line_of_sight_only() {
    let scene = pair(Scene::default().with_darkness(f64::NAN), at("a", 50.0), at("b", 550.0));
    let calc = calculator();
    assert_eq!(
        calc.approximate(&scene, &id("a"), &id("b")).unwrap(),
        VisibilityState::Observed
    );
}

//! Integration tests for cover detection

use sightline_engine::{
    BlockerFilter, CoverConfig, CoverDetector, CoverOptions, IntersectionMode, combine_cover,
};
use sightline_foundation::{CoverState, Point, Rect, TokenId};
use sightline_storage::{ActorData, Alliance, Scene, SizeCategory, Token, Wall};

fn token(id: &str, bounds: Rect, actor: ActorData) -> Token {
    Token::new(id, bounds).with_actor(actor)
}

fn id(s: &str) -> TokenId {
    TokenId::new(s)
}

/// Attacker at the left, target at the right, a huge ally of the attacker in between.
fn ally_scene() -> Scene {
    Scene::default()
        .with_token(token(
            "archer",
            Rect::new(0.0, 0.0, 100.0, 100.0),
            ActorData::default().with_alliance(Alliance::Party),
        ))
        .with_token(token(
            "giant",
            Rect::new(400.0, -100.0, 300.0, 300.0),
            ActorData::default()
                .with_alliance(Alliance::Party)
                .with_size(SizeCategory::Huge),
        ))
        .with_token(token(
            "orc",
            Rect::new(1_000.0, 0.0, 100.0, 100.0),
            ActorData::default().with_alliance(Alliance::Opposition),
        ))
}

#[test]
fn towering_blocker_gives_standard_cover() {
    let detector = CoverDetector::default();
    let cover = detector.detect_between_tokens(
        &ally_scene(),
        &id("archer"),
        &id("orc"),
        &detector.default_options(),
    );
    assert_eq!(cover, CoverState::Standard);
}

#[test]
fn ignoring_allies_removes_the_only_blocker() {
    let detector = CoverDetector::default();
    let options = detector.default_options().with_filter(BlockerFilter {
        ignore_allies: true,
        ..BlockerFilter::default()
    });
    let cover = detector.detect_between_tokens(&ally_scene(), &id("archer"), &id("orc"), &options);
    assert_eq!(cover, CoverState::None);
}

#[test]
fn wall_result_beats_stronger_token_result() {
    let detector = CoverDetector::new(CoverConfig::default().with_mode(IntersectionMode::Coverage));
    let scene = Scene::default()
        .with_token(Token::new("attacker", Rect::new(0.0, 0.0, 100.0, 100.0)))
        .with_token(token(
            "colossus",
            Rect::new(400.0, -200.0, 400.0, 500.0),
            ActorData::default().with_size(SizeCategory::Gargantuan),
        ))
        .with_token(Token::new("target", Rect::new(1_000.0, 0.0, 100.0, 100.0)))
        // Blocks the top two rows of sample rays only.
        .with_wall(Wall::solid("low wall", Point::new(900.0, -50.0), Point::new(900.0, 60.0)));

    let attacker = scene.token(&id("attacker")).unwrap();
    let target = scene.token(&id("target")).unwrap();
    let colossus = scene.token(&id("colossus")).unwrap();
    assert_eq!(
        detector.token_cover(attacker, target, &[colossus], IntersectionMode::Coverage),
        CoverState::Greater
    );

    let report = detector
        .try_detect(&scene, &id("attacker"), &id("target"), &detector.default_options())
        .unwrap();
    assert_eq!(report.wall, CoverState::Standard);
    assert_eq!(report.result, CoverState::Standard);
    assert!(report.blockers.is_empty());
}

#[test]
fn combine_prefers_any_wall_result() {
    assert_eq!(combine_cover(CoverState::Standard, CoverState::Greater), CoverState::Standard);
    assert_eq!(combine_cover(CoverState::None, CoverState::Lesser), CoverState::Lesser);
}

#[test]
fn manual_cover_replaces_computed() {
    let detector = CoverDetector::default();
    let options = CoverOptions::from_config(detector.config()).with_manual_override(CoverState::Greater);
    let cover = detector.detect_between_tokens(&ally_scene(), &id("archer"), &id("orc"), &options);
    assert_eq!(cover, CoverState::Greater);
}

#[test]
fn missing_tokens_fail_safe_to_none() {
    let detector = CoverDetector::default();
    let cover = detector.detect_between_tokens(
        &ally_scene(),
        &id("archer"),
        &id("nobody"),
        &detector.default_options(),
    );
    assert_eq!(cover, CoverState::None);
}

//! Integration tests for scene snapshots

use sightline_foundation::{ErrorKind, Point, Polygon, Rect, TokenId, WallId};
use sightline_storage::{
    DarknessMode, DarknessOverride, DoorState, GridConfig, LightEmission, Region, Scene, Token,
    Wall,
};

fn goblin() -> Token {
    Token::new("goblin", Rect::new(0.0, 0.0, 100.0, 100.0))
}

// =============================================================================
// Snapshots
// =============================================================================

#[test]
fn edits_leave_the_original_untouched() {
    let empty = Scene::default();
    let with_goblin = empty.with_token(goblin());

    assert_eq!(empty.token_count(), 0);
    assert_eq!(with_goblin.token_count(), 1);
    assert!(with_goblin.without_token(&TokenId::new("goblin")).token(&TokenId::new("goblin")).is_none());
}

#[test]
fn move_token_places_top_left() {
    let scene = Scene::default().with_token(goblin());
    let moved = scene.move_token(&TokenId::new("goblin"), Point::new(200.0, 0.0)).unwrap();

    assert_eq!(moved.token(&TokenId::new("goblin")).unwrap().center(), Point::new(250.0, 50.0));
    assert_eq!(scene.token(&TokenId::new("goblin")).unwrap().center(), Point::new(50.0, 50.0));
}

#[test]
fn moving_a_missing_token_fails() {
    let err = Scene::default()
        .move_token(&TokenId::new("ghost"), Point::new(0.0, 0.0))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TokenNotFound(_)));
}

#[test]
fn invalid_grid_fails_validation() {
    let scene = Scene::new(GridConfig {
        size_px: 0.0,
        distance: 5.0,
    });
    let err = scene.validate().unwrap_err();
    assert!(err.is_systemic());
}

// =============================================================================
// Walls, regions, lights
// =============================================================================

#[test]
fn open_doors_block_nothing() {
    let wall = Wall::solid("door", Point::new(0.0, 0.0), Point::new(0.0, 100.0));
    assert!(wall.blocks_sight_now());

    let open = wall.with_door(DoorState::Open);
    assert!(!open.blocks_sight_now());
    assert!(!open.provides_cover_now());
}

#[test]
fn walls_can_be_removed() {
    let scene = Scene::default()
        .with_wall(Wall::solid("w1", Point::new(0.0, 0.0), Point::new(1.0, 0.0)))
        .with_wall(Wall::solid("w2", Point::new(0.0, 1.0), Point::new(1.0, 1.0)));
    let scene = scene.without_wall(&WallId::new("w1"));
    let ids: Vec<_> = scene.walls().map(|w| w.id.as_str().to_string()).collect();
    assert_eq!(ids, ["w2"]);
}

#[test]
fn darkness_overrides_clamp() {
    let add = DarknessOverride {
        mode: DarknessMode::Additive,
        value: 0.8,
    };
    assert_eq!(add.apply(0.5), 1.0);

    let scale = DarknessOverride {
        mode: DarknessMode::Multiplicative,
        value: 0.5,
    };
    assert_eq!(scale.apply(0.5), 0.25);
}

#[test]
fn regions_are_listed() {
    let shape = Polygon::from_rect(Rect::new(0.0, 0.0, 500.0, 500.0));
    let scene = Scene::default().with_region(Region::with_darkness(
        "cellar",
        shape,
        DarknessMode::Absolute,
        1.0,
    ));
    assert_eq!(scene.regions().count(), 1);
}

#[test]
fn unlit_tokens_anchor_no_light() {
    assert!(goblin().light_source().is_none());
    let torch = goblin().with_light(LightEmission::new(20.0, 40.0));
    let light = torch.light_source().unwrap();
    assert_eq!(light.position, Point::new(50.0, 50.0));
    assert_eq!(light.id.as_str(), "token:goblin");
}

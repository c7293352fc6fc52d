//! Integration tests for illumination

use std::rc::Rc;

use proptest::prelude::*;
use sightline_engine::{LightingCalculator, LightingConfig};
use sightline_foundation::{IlluminationLevel, LightId, ManualClock, Millis, Point};
use sightline_storage::{LightSource, Scene};

fn calculator() -> LightingCalculator {
    LightingCalculator::new(
        LightingConfig::default(),
        Rc::new(ManualClock::new(Millis(0))),
    )
}

#[test]
fn dark_scene_without_sources_is_dark() {
    let scene = Scene::default().with_darkness(1.0);
    let lit = calculator().illumination_at(&scene, Point::new(10.0, 10.0)).unwrap();
    assert_eq!(lit.level, IlluminationLevel::Darkness);
}

#[test]
fn torch_lights_a_dark_scene() {
    // 20 pixels per foot: bright 20ft = 400px, dim 40ft = 800px.
    let scene = Scene::default()
        .with_darkness(1.0)
        .with_light(LightSource::new("torch", Point::new(0.0, 0.0), 20.0, 40.0));
    let mut calc = calculator();

    let near = calc.illumination_at(&scene, Point::new(300.0, 0.0)).unwrap();
    let far = calc.illumination_at(&scene, Point::new(600.0, 0.0)).unwrap();
    let out = calc.illumination_at(&scene, Point::new(900.0, 0.0)).unwrap();
    assert_eq!(near.level, IlluminationLevel::Bright);
    assert_eq!(far.level, IlluminationLevel::Dim);
    assert_eq!(out.level, IlluminationLevel::Darkness);
}

#[test]
fn darkness_source_names_itself() {
    let scene = Scene::default().with_light(LightSource::darkness(
        "void",
        Point::new(0.0, 0.0),
        10.0,
        20.0,
    ));
    let lit = calculator().illumination_at(&scene, Point::new(100.0, 0.0)).unwrap();
    assert_eq!(lit.forced_by, Some(LightId::new("void")));
}

#[test]
fn non_finite_darkness_is_systemic() {
    let scene = Scene::default().with_darkness(f64::INFINITY);
    let err = calculator().illumination_at(&scene, Point::new(0.0, 0.0)).unwrap_err();
    assert!(err.is_systemic());
}

proptest! {
    #[test]
    fn global_illumination_alone_is_bright(x in -5_000.0f64..5_000.0, y in -5_000.0f64..5_000.0) {
        let scene = Scene::default();
        let lit = calculator().illumination_at(&scene, Point::new(x, y)).unwrap();
        prop_assert_eq!(lit.level, IlluminationLevel::Bright);
    }

    #[test]
    fn darkness_source_beats_overlapping_light(
        angle in 0.0f64..std::f64::consts::TAU,
        radius in 0.0f64..390.0,
    ) {
        // Darkness dim radius 20ft = 400px; the bright light reaches further.
        let center = Point::new(1_000.0, 1_000.0);
        let scene = Scene::default()
            .with_light(LightSource::new("sun", center, 30.0, 60.0))
            .with_light(LightSource::darkness("void", center, 10.0, 20.0));
        let point = Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin());

        let lit = calculator().illumination_at(&scene, point).unwrap();
        prop_assert_eq!(lit.level, IlluminationLevel::Darkness);
    }
}

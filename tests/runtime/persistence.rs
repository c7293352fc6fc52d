//! Integration tests for saving and restoring relationship state

use std::rc::Rc;

use sightline_foundation::{CoverState, ManualClock, Millis, VisibilityState};
use sightline_runtime::{
    ActionKind, ActionOutcome, EngineConfig, Orchestrator, PersistedState, load_from_file,
    save_to_file,
};
use sightline_storage::RelationshipStore;

use crate::support::{id, key, orchestrator, three_tokens};

#[test]
fn reloaded_state_needs_no_rewrites() {
    let config = EngineConfig::immediate().with_auto_cover(true);
    let (_, mut o) = orchestrator(config.clone());
    let scene = three_tokens();
    o.apply_action_outcome(
        &ActionOutcome::new(ActionKind::Sneak, "a", "b", VisibilityState::Undetected)
            .with_cover(CoverState::Standard),
    )
    .unwrap();
    o.recalculate_all_visibility(&scene, false);

    let (relationships, flags) = o.into_stores();
    let state = PersistedState::capture(&relationships, &flags);
    let path = std::env::temp_dir().join(format!(
        "sightline-runtime-reload-{}.msgpack",
        std::process::id()
    ));
    save_to_file(&state, &path).unwrap();
    let loaded = load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, state);

    let (relationships, flags) = loaded.restore().unwrap();
    let clock = Rc::new(ManualClock::new(Millis(0)));
    let mut reloaded = Orchestrator::new(config, clock, relationships, flags);

    assert!(reloaded.overrides().get(&id("a"), &id("b")).is_some());
    assert_eq!(
        reloaded.store().visibility(&key("a", "b")),
        Some(VisibilityState::Undetected)
    );
    assert_eq!(
        reloaded.store().cover(&key("a", "b")),
        Some(CoverState::Standard)
    );

    let writes = reloaded.store().write_count();
    let summary = reloaded.recalculate_all_visibility(&scene, false);
    assert_eq!(summary.pinned, 1);
    assert_eq!(summary.total_writes(), 0);
    assert_eq!(reloaded.store().write_count(), writes);
}

#[test]
fn empty_stores_capture_an_empty_snapshot() {
    let (_, o) = orchestrator(EngineConfig::default());
    let (relationships, flags) = o.into_stores();
    let state = PersistedState::capture(&relationships, &flags);
    assert_eq!(state, PersistedState::default());
}

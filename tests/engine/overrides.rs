//! Integration tests for override storage and validation

use std::rc::Rc;

use sightline_engine::{OverrideManager, requirements_hold};
use sightline_foundation::{CoverState, ManualClock, Millis, TokenId, VisibilityState};
use sightline_storage::{MemoryFlagStore, OverrideRecord, OverrideSource};

fn record(observer: &str, target: &str, source: OverrideSource) -> OverrideRecord {
    OverrideRecord::new(
        TokenId::new(observer),
        TokenId::new(target),
        source,
        VisibilityState::Hidden,
        Millis(0),
    )
}

#[test]
fn expired_overrides_vanish_on_read() {
    let clock = Rc::new(ManualClock::new(Millis(0)));
    let mut manager = OverrideManager::new(MemoryFlagStore::new(), clock.clone());
    manager
        .apply_override(record("guard", "rogue", OverrideSource::Hide).with_expiry(Millis(1_000)))
        .unwrap();

    assert!(manager.get(&TokenId::new("guard"), &TokenId::new("rogue")).is_some());
    clock.advance(1_000);
    assert!(manager.get(&TokenId::new("guard"), &TokenId::new("rogue")).is_none());
    assert!(manager.store().is_empty());
}

#[test]
fn clearing_by_token_hits_both_directions() {
    let clock = Rc::new(ManualClock::new(Millis(0)));
    let mut manager = OverrideManager::new(MemoryFlagStore::new(), clock);
    manager.apply_override(record("a", "b", OverrideSource::Seek)).unwrap();
    manager.apply_override(record("b", "a", OverrideSource::Sneak)).unwrap();
    manager.apply_override(record("c", "d", OverrideSource::Hide)).unwrap();

    assert_eq!(manager.clear_all_overrides(Some(&TokenId::new("a"))).unwrap(), 2);
    assert_eq!(manager.all_overrides().len(), 1);
    assert_eq!(manager.clear_all_overrides(None).unwrap(), 1);
}

#[test]
fn requirements_follow_cover_and_concealment() {
    let needs_cover = record("guard", "rogue", OverrideSource::Hide).with_requirements(true, false);
    assert!(requirements_hold(&needs_cover, CoverState::Lesser, VisibilityState::Observed));
    assert!(!requirements_hold(&needs_cover, CoverState::None, VisibilityState::Hidden));

    let needs_concealment = record("guard", "rogue", OverrideSource::Sneak).with_requirements(false, true);
    assert!(requirements_hold(&needs_concealment, CoverState::None, VisibilityState::Concealed));
    assert!(!requirements_hold(&needs_concealment, CoverState::Greater, VisibilityState::Observed));
}

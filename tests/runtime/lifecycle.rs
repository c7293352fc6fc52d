//! Integration tests for enable, disable, and pausing

use std::cell::Cell;
use std::rc::Rc;

use sightline_foundation::WallId;
use sightline_runtime::{
    ChangeKind, EngineConfig, EventHub, RecomputeSummary, SkipReason, WorldEvent,
};
use sightline_storage::RelationshipStore;

use crate::support::{id, key, orchestrator, three_tokens};

#[test]
fn disable_drops_timers_and_subscription() {
    let (clock, mut o) = orchestrator(EngineConfig::default());
    let mut hub = EventHub::new();
    let scene = three_tokens();

    o.enable(&mut hub);
    assert!(o.is_listening());
    assert_eq!(hub.subscriber_count(), 1);

    hub.publish(WorldEvent::TokenCreated(id("a")));
    hub.publish(WorldEvent::WallChanged {
        id: WallId::new("w"),
        change: ChangeKind::Created,
    });
    o.pump(&mut hub, &scene);
    assert_eq!(o.pending_tasks(), 2);

    o.disable(&mut hub);
    assert_eq!(o.pending_tasks(), 0);
    assert!(!o.is_listening());
    assert_eq!(hub.subscriber_count(), 0);

    clock.advance(1_000);
    assert_eq!(hub.publish(WorldEvent::SceneDarknessChanged), 0);
    assert!(o.pump(&mut hub, &scene).is_empty());
    assert_eq!(o.store().write_count(), 0);
}

#[test]
fn disabled_orchestrator_ignores_events() {
    let (_, mut o) = orchestrator(EngineConfig::default().with_enabled(false));
    o.handle_event(&three_tokens(), &WorldEvent::TokenCreated(id("a")));
    assert_eq!(o.pending_tasks(), 0);
    assert_eq!(o.stats().events, 0);
}

#[test]
fn enable_after_disable_listens_again() {
    let (_, mut o) = orchestrator(EngineConfig::default());
    let mut hub = EventHub::new();
    o.enable(&mut hub);
    o.disable(&mut hub);
    o.enable(&mut hub);
    assert!(o.is_enabled());
    assert_eq!(hub.subscriber_count(), 1);
}

#[test]
fn open_dialog_pauses_until_closed() {
    let (clock, mut o) = orchestrator(EngineConfig::default());
    let mut hub = EventHub::new();
    let scene = three_tokens();
    o.enable(&mut hub);

    hub.publish(WorldEvent::ConfigDialogOpened("lighting".into()));
    hub.publish(WorldEvent::ConfigDialogOpened("walls".into()));
    hub.publish(WorldEvent::TokenCreated(id("a")));
    o.pump(&mut hub, &scene);
    assert!(o.is_paused());

    clock.advance(100);
    assert!(o.pump(&mut hub, &scene).is_empty());
    assert_eq!(
        o.recalculate_all_visibility(&scene, false).skipped,
        Some(SkipReason::Paused)
    );
    assert_eq!(o.store().write_count(), 0);

    hub.publish(WorldEvent::ConfigDialogClosed("lighting".into()));
    assert!(o.pump(&mut hub, &scene).is_empty());
    assert!(o.is_paused());

    // Closing the last dialog runs what was held back and queues a flush.
    hub.publish(WorldEvent::ConfigDialogClosed("walls".into()));
    let ran = o.pump(&mut hub, &scene);
    assert_eq!(ran.len(), 1);
    assert!(o.store().visibility(&key("a", "b")).is_some());

    clock.advance(500);
    let flushed = o.pump(&mut hub, &scene);
    assert_eq!(flushed.len(), 1);
    assert_eq!(o.stats().full_recomputes, 1);
    assert!(o.store().visibility(&key("b", "c")).is_some());
}

#[test]
fn one_refresh_signal_per_recompute() {
    let count = Rc::new(Cell::new(0));
    let sink = Rc::clone(&count);
    let (_, o) = orchestrator(EngineConfig::immediate());
    let mut o = o.with_refresh(move |_: &RecomputeSummary| sink.set(sink.get() + 1));
    let scene = three_tokens();

    o.recalculate_all_visibility(&scene, false);
    o.recalculate_all_visibility(&scene, false);
    o.recalculate_token(&scene, &id("a"));

    assert_eq!(count.get(), 3);
    assert_eq!(o.stats().refreshes, 3);
}

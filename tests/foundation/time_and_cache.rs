//! Integration tests for clocks and the TTL cache

use std::rc::Rc;

use sightline_foundation::{Clock, ManualClock, Millis, TtlCache};

#[test]
fn manual_clock_is_shared_through_rc() {
    let clock = Rc::new(ManualClock::new(Millis(100)));
    let shared: Rc<dyn Clock> = clock.clone();
    clock.advance(50);
    assert_eq!(shared.now(), Millis(150));
    clock.set(Millis(10));
    assert_eq!(shared.now(), Millis(10));
}

#[test]
fn cache_entries_go_stale_at_ttl() {
    let mut cache = TtlCache::new(250);
    cache.insert("lights", 3, Millis(0));
    assert_eq!(cache.get(&"lights", Millis(249)), Some(&3));
    assert_eq!(cache.get(&"lights", Millis(250)), None);
}

#[test]
fn cache_recomputes_only_when_stale() {
    let mut cache: TtlCache<&str, u32> = TtlCache::new(100);
    let mut calls = 0;
    for now in [0, 50, 99, 100] {
        cache
            .get_or_try_insert_with("k", Millis(now), || {
                calls += 1;
                Ok::<_, ()>(calls)
            })
            .unwrap();
    }
    assert_eq!(calls, 2);
}

#[test]
fn failed_compute_stores_nothing() {
    let mut cache: TtlCache<&str, u32> = TtlCache::new(100);
    let result = cache.get_or_try_insert_with("k", Millis(0), || Err("down"));
    assert_eq!(result, Err("down"));
    assert!(cache.is_empty());
}

//! Integration tests for override flags

use sightline_foundation::{CoverState, Millis, TokenId, VisibilityState};
use sightline_storage::{
    FlagStore, MemoryFlagStore, OverrideRecord, OverrideSource, override_key, parse_override_key,
};

fn hide(observer: &str, target: &str) -> OverrideRecord {
    OverrideRecord::new(
        TokenId::new(observer),
        TokenId::new(target),
        OverrideSource::Hide,
        VisibilityState::Hidden,
        Millis(0),
    )
}

#[test]
fn keys_name_the_observer() {
    let key = override_key(&TokenId::new("guard"));
    assert_eq!(key, "override-from-guard");
    assert_eq!(parse_override_key(&key), Some(TokenId::new("guard")));
    assert_eq!(parse_override_key("unrelated"), None);
}

#[test]
fn records_live_under_the_target() {
    let mut flags = MemoryFlagStore::new();
    let record = hide("guard", "rogue").with_cover(CoverState::Standard);
    flags.set(&record.target, &record.key(), record.clone()).unwrap();

    assert_eq!(flags.tokens(), vec![TokenId::new("rogue")]);
    assert_eq!(flags.get(&TokenId::new("rogue"), "override-from-guard"), Some(record));
    assert!(flags.get(&TokenId::new("guard"), "override-from-rogue").is_none());
}

#[test]
fn unset_reports_presence() {
    let mut flags = MemoryFlagStore::new();
    let record = hide("guard", "rogue");
    flags.set(&record.target, &record.key(), record.clone()).unwrap();

    assert!(flags.unset(&record.target, &record.key()).unwrap());
    assert!(!flags.unset(&record.target, &record.key()).unwrap());
    assert!(flags.is_empty());
}

#[test]
fn expiry_is_inclusive_of_the_deadline() {
    let record = hide("guard", "rogue").with_expiry(Millis(6_000));
    assert!(!record.is_expired(Millis(5_999)));
    assert!(record.is_expired(Millis(6_000)));
    assert!(!hide("guard", "rogue").is_expired(Millis(u64::MAX)));
}

//! Tests for effective day windows: weekly rules, overrides and their precedence.

mod common;

use chrono_tz::Tz;
use common::*;
use slot_engine::rules::{DayWindow, RuleBook, WindowSource};
use slot_engine::{get_effective_day_windows, InMemoryStore, SlotError, StoreSnapshot};

fn times(windows: &[DayWindow]) -> Vec<(chrono::NaiveTime, chrono::NaiveTime)> {
    windows.iter().map(|w| (w.start, w.end)).collect()
}

#[test]
fn weekly_rule_applies_only_on_its_weekday() {
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![rule("r1", 1, t(9, 0), t(17, 0), "UTC")],
        vec![],
    )
    .unwrap();

    let monday = book.effective_day_windows(date(2026, 3, 16), None).unwrap();
    assert_eq!(times(&monday), vec![(t(9, 0), t(17, 0))]);
    assert_eq!(monday[0].source, WindowSource::Rule);
    assert_eq!(monday[0].timezone, Tz::UTC);

    let tuesday = book.effective_day_windows(date(2026, 3, 17), None).unwrap();
    assert!(tuesday.is_empty());
}

#[test]
fn overlapping_and_adjacent_rules_merge_into_disjoint_windows() {
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![
            rule("r1", 1, t(15, 0), t(16, 0), "UTC"),
            rule("r2", 1, t(9, 0), t(12, 0), "UTC"),
            rule("r3", 1, t(11, 0), t(13, 0), "UTC"),
            rule("r4", 1, t(13, 0), t(14, 0), "UTC"),
        ],
        vec![],
    )
    .unwrap();

    let windows = book.effective_day_windows(date(2026, 3, 16), None).unwrap();
    assert_eq!(
        times(&windows),
        vec![(t(9, 0), t(14, 0)), (t(15, 0), t(16, 0))]
    );
}

#[test]
fn rules_in_different_zones_are_not_merged() {
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![
            rule("r1", 1, t(9, 0), t(12, 0), "UTC"),
            rule("r2", 1, t(10, 0), t(13, 0), "Europe/Berlin"),
        ],
        vec![],
    )
    .unwrap();

    let windows = book.effective_day_windows(date(2026, 3, 16), None).unwrap();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].timezone, Tz::UTC);
    assert_eq!(windows[1].timezone.name(), "Europe/Berlin");
}

#[test]
fn unavailable_override_blocks_the_whole_day() {
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![rule("r1", 1, t(9, 0), t(17, 0), "UTC")],
        vec![blocked_override("o1", date(2026, 3, 16))],
    )
    .unwrap();

    assert!(book
        .effective_day_windows(date(2026, 3, 16), None)
        .unwrap()
        .is_empty());
    assert!(book.is_blocked(date(2026, 3, 16)).unwrap());
    // The following Monday is unaffected.
    assert_eq!(
        times(&book.effective_day_windows(date(2026, 3, 23), None).unwrap()),
        vec![(t(9, 0), t(17, 0))]
    );
}

#[test]
fn available_override_replaces_rules_instead_of_merging() {
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![rule("r1", 1, t(9, 0), t(17, 0), "UTC")],
        vec![replacement_override("o1", date(2026, 3, 16), t(10, 0), t(12, 0))],
    )
    .unwrap();

    let windows = book.effective_day_windows(date(2026, 3, 16), None).unwrap();
    assert_eq!(times(&windows), vec![(t(10, 0), t(12, 0))]);
    assert_eq!(windows[0].source, WindowSource::Override);
}

#[test]
fn override_on_a_day_without_rules_opens_it() {
    // Sunday has no rule; the override makes it available.
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![rule("r1", 1, t(9, 0), t(17, 0), "UTC")],
        vec![replacement_override("o1", date(2026, 3, 15), t(8, 0), t(9, 0))],
    )
    .unwrap();

    assert_eq!(
        times(&book.effective_day_windows(date(2026, 3, 15), None).unwrap()),
        vec![(t(8, 0), t(9, 0))]
    );
}

#[test]
fn event_type_override_beats_general_override() {
    let mut specific = replacement_override("o-specific", date(2026, 3, 16), t(13, 0), t(15, 0));
    specific.event_type_id = Some(EVENT.into());
    let general = blocked_override("o-general", date(2026, 3, 16));
    let rules = vec![rule("r1", 1, t(9, 0), t(17, 0), "UTC")];

    let for_event = RuleBook::new(Some(EVENT), None, rules.clone(), vec![general.clone(), specific.clone()]).unwrap();
    assert_eq!(
        times(&for_event.effective_day_windows(date(2026, 3, 16), None).unwrap()),
        vec![(t(13, 0), t(15, 0))]
    );

    // Another event type only sees the general override.
    let for_other = RuleBook::new(Some("et-60"), None, rules, vec![general, specific]).unwrap();
    assert!(for_other
        .effective_day_windows(date(2026, 3, 16), None)
        .unwrap()
        .is_empty());
}

#[test]
fn several_overrides_at_the_winning_scope_are_unioned() {
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![],
        vec![
            replacement_override("o1", date(2026, 3, 16), t(14, 0), t(15, 0)),
            replacement_override("o2", date(2026, 3, 16), t(9, 0), t(10, 0)),
        ],
    )
    .unwrap();

    assert_eq!(
        times(&book.effective_day_windows(date(2026, 3, 16), None).unwrap()),
        vec![(t(9, 0), t(10, 0)), (t(14, 0), t(15, 0))]
    );
}

#[test]
fn specific_rules_replace_global_rules_for_the_same_day() {
    let mut specific = rule("r-specific", 1, t(10, 0), t(11, 0), "UTC");
    specific.event_type_id = Some(EVENT.into());
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![
            rule("r-global-mon", 1, t(9, 0), t(17, 0), "UTC"),
            rule("r-global-tue", 2, t(9, 0), t(17, 0), "UTC"),
            specific,
        ],
        vec![],
    )
    .unwrap();

    assert_eq!(
        times(&book.effective_day_windows(date(2026, 3, 16), None).unwrap()),
        vec![(t(10, 0), t(11, 0))]
    );
    // Tuesday has no specific rule, so the global one applies.
    assert_eq!(
        times(&book.effective_day_windows(date(2026, 3, 17), None).unwrap()),
        vec![(t(9, 0), t(17, 0))]
    );
}

#[test]
fn rules_of_other_event_types_and_companies_are_ignored() {
    let mut other_event = rule("r-other", 1, t(6, 0), t(7, 0), "UTC");
    other_event.event_type_id = Some("et-60".into());
    let mut other_company = rule("r-company", 1, t(20, 0), t(21, 0), "UTC");
    other_company.company_profile_id = Some("acme".into());

    let book = RuleBook::new(
        Some(EVENT),
        Some("globex"),
        vec![rule("r1", 1, t(9, 0), t(10, 0), "UTC"), other_event, other_company],
        vec![],
    )
    .unwrap();

    assert_eq!(
        times(&book.effective_day_windows(date(2026, 3, 16), None).unwrap()),
        vec![(t(9, 0), t(10, 0))]
    );
}

#[test]
fn timezone_override_reinterprets_rules() {
    let book = RuleBook::new(
        Some(EVENT),
        None,
        vec![rule("r1", 1, t(9, 0), t(10, 0), "UTC")],
        vec![],
    )
    .unwrap();
    let ny: Tz = "America/New_York".parse().unwrap();

    let windows = book.effective_day_windows(date(2026, 3, 16), Some(ny)).unwrap();
    assert_eq!(windows[0].timezone, ny);
    assert_eq!(windows[0].local_start(), date(2026, 3, 16).and_time(t(9, 0)));
}

#[test]
fn malformed_rule_reports_its_id() {
    let err = RuleBook::new(
        Some(EVENT),
        None,
        vec![rule("r-bad", 1, t(9, 0), t(10, 0), "Not/AZone")],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, SlotError::Configuration { ref entity_id, .. } if entity_id == "r-bad"));

    let inverted = RuleBook::new(
        Some(EVENT),
        None,
        vec![rule("r-inverted", 1, t(12, 0), t(10, 0), "UTC")],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(inverted, SlotError::Configuration { ref entity_id, .. } if entity_id == "r-inverted"));
}

#[test]
fn store_lookup_for_unknown_user_is_empty_not_an_error() {
    let store = InMemoryStore::from_snapshot(monday_morning()).unwrap();
    let windows =
        get_effective_day_windows(&store, "nobody", Some(EVENT), date(2026, 3, 16), None).unwrap();
    assert!(windows.is_empty());

    let known = get_effective_day_windows(&store, HOST, Some(EVENT), date(2026, 3, 16), None).unwrap();
    assert_eq!(times(&known), vec![(t(9, 0), t(11, 0))]);
}

#[test]
fn store_lookup_for_unknown_event_type_is_empty() {
    let store = InMemoryStore::from_snapshot(monday_morning()).unwrap();
    let windows =
        get_effective_day_windows(&store, HOST, Some("et-missing"), date(2026, 3, 16), None).unwrap();
    assert!(windows.is_empty());
}

#[test]
fn store_lookup_rejects_unknown_timezone_argument() {
    let store = InMemoryStore::from_snapshot(StoreSnapshot::default()).unwrap();
    let err = get_effective_day_windows(&store, HOST, None, date(2026, 3, 16), Some("Moon/Base"))
        .unwrap_err();
    assert!(matches!(err, SlotError::Validation(_)));
}

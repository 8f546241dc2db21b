//! Property-based tests for availability resolution using proptest.
//!
//! Random rules, bookings and event type settings over a two-week range that
//! includes the US spring-forward date.

mod common;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use common::*;
use proptest::prelude::*;
use slot_engine::{
    get_blocking_intervals, AvailabilityRule, Booking, DstPolicy, EventType, InMemoryStore,
    Resolver, ResolverConfig, StoreSnapshot, TimeRange,
};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_timezone() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("UTC"),
        Just("America/New_York"),
        Just("Europe/Berlin"),
        Just("Asia/Kolkata"),
    ]
}

fn arb_policy() -> impl Strategy<Value = DstPolicy> {
    prop_oneof![Just(DstPolicy::Skip), Just(DstPolicy::ShiftForward)]
}

fn arb_rule() -> impl Strategy<Value = (i16, u32, u32, u32)> {
    // (day_of_week, start hour, start minute, length in hours)
    (0i16..=6, 0u32..=20, prop_oneof![Just(0u32), Just(30u32)], 1u32..=3)
}

fn arb_booking() -> impl Strategy<Value = (i64, i64)> {
    // (offset from range start in quarter hours, length in quarter hours)
    (0i64..(14 * 24 * 4), 1i64..=12)
}

fn arb_event_type() -> impl Strategy<Value = EventType> {
    (
        prop_oneof![Just(15i32), Just(30i32), Just(45i32), Just(60i32), Just(90i32)],
        0i32..=30,
        0i32..=30,
        0i32..=48,
        1i32..=30,
    )
        .prop_map(|(duration, before, after, notice, window)| EventType {
            buffer_before_minutes: before,
            buffer_after_minutes: after,
            minimum_notice_hours: notice,
            booking_window_days: window,
            ..event_type(EVENT, duration)
        })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn range_start() -> DateTime<Utc> {
    utc(2026, 3, 2, 0, 0)
}

fn range_end() -> DateTime<Utc> {
    utc(2026, 3, 16, 0, 0)
}

fn build_snapshot(
    tz: &str,
    rules: &[(i16, u32, u32, u32)],
    bookings: &[(i64, i64)],
    et: EventType,
) -> StoreSnapshot {
    let rules: Vec<AvailabilityRule> = rules
        .iter()
        .enumerate()
        .map(|(i, &(dow, hour, minute, len))| {
            rule(&format!("r{i}"), dow, t(hour, minute), t(hour + len, minute), tz)
        })
        .collect();
    let bookings: Vec<Booking> = bookings
        .iter()
        .enumerate()
        .map(|(i, &(offset, len))| {
            let start = range_start() + Duration::minutes(offset * 15);
            booking(&format!("b{i}"), EVENT, start, start + Duration::minutes(len * 15))
        })
        .collect();
    StoreSnapshot {
        hosts: vec![host()],
        event_types: vec![et],
        availability_rules: rules,
        bookings,
        ..StoreSnapshot::default()
    }
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    }
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn resolved_windows_satisfy_every_constraint(
        tz in arb_timezone(),
        dst_policy in arb_policy(),
        rules in prop::collection::vec(arb_rule(), 1..6),
        bookings in prop::collection::vec(arb_booking(), 0..6),
        et in arb_event_type(),
        now_offset in 0i64..(20 * 24),
    ) {
        let now = utc(2026, 2, 28, 0, 0) + Duration::hours(now_offset);
        let snapshot = build_snapshot(tz, &rules, &bookings, et.clone());
        let store = InMemoryStore::from_snapshot(snapshot).unwrap();
        let resolver = Resolver::with_config(
            &store,
            ResolverConfig { dst_policy, ..ResolverConfig::default() },
        )
        .unwrap();
        let req = request(range_start(), range_end());

        let result = resolver.resolve_at(&req, now).unwrap();
        let zone: Tz = tz.parse().unwrap();
        let blocking = get_blocking_intervals(
            &store,
            HOST,
            TimeRange::new(range_start(), range_end() + Duration::days(1)).unwrap(),
        )
        .unwrap();

        for pair in result.windows.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start, "overlap: {:?}", pair);
        }
        for w in &result.windows {
            let local = w.end.with_timezone(&zone).naive_local()
                - w.start.with_timezone(&zone).naive_local();
            prop_assert_eq!(local.num_minutes(), i64::from(et.duration_minutes));
            prop_assert!(w.start >= now + Duration::hours(i64::from(et.minimum_notice_hours)));
            prop_assert!(w.start <= now + Duration::days(i64::from(et.booking_window_days)));
            prop_assert!(w.start >= range_start() && w.start < range_end());

            let padded = TimeRange {
                start: w.start - Duration::minutes(i64::from(et.buffer_before_minutes)),
                end: w.end + Duration::minutes(i64::from(et.buffer_after_minutes)),
            };
            for b in &blocking {
                prop_assert!(
                    !(padded.start < b.end && b.start < padded.end),
                    "{:?} overlaps {:?}",
                    w,
                    b
                );
            }
        }

        prop_assert_eq!(resolver.resolve_at(&req, now).unwrap(), result);
    }
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn blocked_days_never_produce_windows(
        rules in prop::collection::vec(arb_rule(), 1..6),
        day in 2u32..16,
    ) {
        let mut snapshot = build_snapshot("UTC", &rules, &[], event_type(EVENT, 30));
        snapshot.availability_overrides.push(blocked_override("o1", date(2026, 3, day)));
        let store = InMemoryStore::from_snapshot(snapshot).unwrap();

        let result = Resolver::new(&store)
            .resolve_at(&request(range_start(), range_end()), utc(2026, 3, 1, 0, 0))
            .unwrap();

        prop_assert!(result.windows.iter().all(|w| w.start.date_naive() != date(2026, 3, day)));
    }
}

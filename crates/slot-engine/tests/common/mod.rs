//! Shared record builders for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use slot_engine::{
    AvailabilityOverride, AvailabilityRequest, AvailabilityRule, BookableWindow, Booking,
    BookingStatus, EventType, Host, Invitee, SchedulingMode, StoreSnapshot, TimeSlot,
};

pub const HOST: &str = "host-1";
pub const EVENT: &str = "et-30";

pub fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

/// Monday 2026-03-16 at `hour:minute` UTC.
pub fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
    utc(2026, 3, 16, hour, minute)
}

/// Two weeks before the Monday the tests resolve.
pub fn now() -> DateTime<Utc> {
    utc(2026, 3, 1, 0, 0)
}

pub fn host() -> Host {
    Host {
        id: HOST.into(),
        timezone: Some("UTC".into()),
        company_profile_id: None,
    }
}

pub fn event_type(id: &str, duration_minutes: i32) -> EventType {
    EventType {
        id: id.into(),
        owner_user_id: HOST.into(),
        slug: id.into(),
        title: format!("{duration_minutes} minute meeting"),
        duration_minutes,
        buffer_before_minutes: 0,
        buffer_after_minutes: 0,
        location_type: Some("video".into()),
        location_value: None,
        minimum_notice_hours: 0,
        booking_window_days: 60,
        is_active: true,
        price: None,
        scheduling: SchedulingMode::Rules,
        created_at: None,
        updated_at: None,
    }
}

/// A global (all event types) weekly rule in `tz`.
pub fn rule(id: &str, day_of_week: i16, start: NaiveTime, end: NaiveTime, tz: &str) -> AvailabilityRule {
    AvailabilityRule {
        id: id.into(),
        company_profile_id: None,
        user_id: HOST.into(),
        event_type_id: None,
        day_of_week,
        start_time: start,
        end_time: end,
        timezone: tz.into(),
        created_at: None,
    }
}

pub fn blocked_override(id: &str, on: NaiveDate) -> AvailabilityOverride {
    AvailabilityOverride {
        id: id.into(),
        company_profile_id: None,
        user_id: HOST.into(),
        event_type_id: None,
        date: on,
        is_unavailable: true,
        start_time: None,
        end_time: None,
        timezone: "UTC".into(),
        created_at: None,
    }
}

pub fn replacement_override(
    id: &str,
    on: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> AvailabilityOverride {
    AvailabilityOverride {
        is_unavailable: false,
        start_time: Some(start),
        end_time: Some(end),
        ..blocked_override(id, on)
    }
}

pub fn booking(id: &str, event_type_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Booking {
    Booking {
        id: id.into(),
        event_type_id: event_type_id.into(),
        host_user_id: HOST.into(),
        invitee: Invitee {
            name: "Ada".into(),
            email: "ada@example.com".into(),
        },
        start_at: start,
        end_at: end,
        status: BookingStatus::Scheduled,
        cancel_reason: None,
        cancel_token: None,
        reschedule_token: None,
        time_slot_id: None,
        number_of_participants: 1,
        participant_names: Vec::new(),
    }
}

pub fn session(id: &str, event_type_id: &str, day_of_week: Option<i16>, start: NaiveTime, end: NaiveTime, max: Option<i32>) -> TimeSlot {
    TimeSlot {
        id: id.into(),
        event_type_id: event_type_id.into(),
        day_of_week,
        start_time: start,
        end_time: end,
        timezone: None,
        max_participants: max,
    }
}

pub fn request(range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> AvailabilityRequest {
    AvailabilityRequest {
        user_id: HOST.into(),
        event_type_id: EVENT.into(),
        range_start,
        range_end,
        timezone: None,
        company_profile_id: None,
    }
}

/// Host with a 30-minute event type and a Monday 09:00-11:00 UTC rule.
pub fn monday_morning() -> StoreSnapshot {
    StoreSnapshot {
        hosts: vec![host()],
        event_types: vec![event_type(EVENT, 30)],
        availability_rules: vec![rule("r-mon", 1, t(9, 0), t(11, 0), "UTC")],
        ..StoreSnapshot::default()
    }
}

pub fn spans(windows: &[BookableWindow]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    windows.iter().map(|w| (w.start, w.end)).collect()
}

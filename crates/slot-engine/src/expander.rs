//! Expansion of fixed recurring sessions (`event_type_time_slots`) into dates.
//!
//! A session repeating every day becomes `FREQ=DAILY`, a weekly one
//! `FREQ=WEEKLY;BYDAY=..`, expanded with the `rrule` crate in the session's
//! timezone. Only the local start times are taken from the expansion; the
//! caller resolves them to instants under its DST policy.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{Result, SlotError};
use crate::model::TimeSlot;

/// RFC 5545 weekday codes indexed by `day_of_week` (0 = Sunday).
const BYDAY: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

/// Local start times of `slot` on every matching date in `[first, last]`.
///
/// # Errors
/// Returns a configuration error naming the slot if its weekday is out of
/// range or the recurrence cannot be expanded.
pub fn expand_sessions(
    slot: &TimeSlot,
    tz: Tz,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<Vec<NaiveDateTime>> {
    let weekday = match slot.day_of_week {
        Some(day) => Some(
            usize::try_from(day)
                .ok()
                .filter(|d| *d < BYDAY.len())
                .ok_or_else(|| SlotError::config(&slot.id, format!("day_of_week {day} outside 0..=6")))?,
        ),
        None => None,
    };

    // Anchor DTSTART on the first matching date so it is itself an occurrence.
    let matching: Vec<NaiveDate> = first
        .iter_days()
        .take_while(|d| *d <= last)
        .filter(|d| weekday.is_none_or(|w| d.weekday().num_days_from_sunday() as usize == w))
        .collect();
    let Some(anchor) = matching.first() else {
        return Ok(Vec::new());
    };
    let count = u16::try_from(matching.len()).map_err(|_| {
        SlotError::config(&slot.id, "expansion range too long for a session")
    })?;

    let freq = match weekday {
        None => "FREQ=DAILY".to_string(),
        Some(w) => format!("FREQ=WEEKLY;BYDAY={}", BYDAY[w]),
    };
    let dtstart = anchor.and_time(slot.start_time).format("%Y%m%dT%H%M%S");
    let rrule_text = format!(
        "DTSTART;TZID={}:{}\nRRULE:{};COUNT={}",
        tz.name(),
        dtstart,
        freq,
        count
    );

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| SlotError::config(&slot.id, format!("cannot expand session: {e}")))?;

    let mut starts: Vec<NaiveDateTime> = rrule_set
        .all(count)
        .dates
        .into_iter()
        .map(|dt| dt.naive_local())
        .filter(|local| local.date() >= first && local.date() <= last)
        .collect();
    starts.sort();
    starts.dedup();
    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn slot(day_of_week: Option<i16>) -> TimeSlot {
        TimeSlot {
            id: "ts-1".into(),
            event_type_id: "et-1".into(),
            day_of_week,
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            timezone: None,
            max_participants: Some(10),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_session_lands_on_its_weekday() {
        // 2026-03-16 is a Monday; Wednesdays in range are the 18th and 25th.
        let starts =
            expand_sessions(&slot(Some(3)), Tz::UTC, date(2026, 3, 16), date(2026, 3, 29)).unwrap();
        assert_eq!(
            starts,
            vec![
                date(2026, 3, 18).and_hms_opt(18, 0, 0).unwrap(),
                date(2026, 3, 25).and_hms_opt(18, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn daily_session_covers_every_date() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let starts = expand_sessions(&slot(None), tz, date(2026, 3, 27), date(2026, 3, 30)).unwrap();
        assert_eq!(starts.len(), 4);
        // Local wall-clock time is stable across the 29 March DST change.
        assert!(starts
            .iter()
            .all(|s| s.time() == NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
    }

    #[test]
    fn no_matching_date_yields_nothing() {
        // Sunday session, Monday-to-Wednesday range.
        let starts =
            expand_sessions(&slot(Some(0)), Tz::UTC, date(2026, 3, 16), date(2026, 3, 18)).unwrap();
        assert!(starts.is_empty());
    }
}

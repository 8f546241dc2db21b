//! Slot generation: candidate windows for a date range.
//!
//! In rule mode every effective day window is cut into back-to-back slots of
//! exactly `duration_minutes`, starting at the window start; a trailing
//! remainder shorter than the duration is dropped. Arithmetic happens in
//! local wall-clock time and each boundary is converted to an instant once,
//! so a slot always spans `duration_minutes` on the wall clock even across a
//! DST change. In fixed-session mode candidates are the event type's
//! TimeSlot occurrences.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::dst::{parse_timezone, span_to_utc, DstPolicy};
use crate::error::Result;
use crate::expander::expand_sessions;
use crate::model::{EventType, TimeRange, TimeSlot};
use crate::rules::{DayWindow, RuleBook};

/// A window a booking could start in, before constraints are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The fixed session this candidate belongs to, if any.
    pub time_slot_id: Option<String>,
    /// Seats of the session; `None` for rule slots and unlimited sessions.
    pub capacity: Option<u32>,
}

impl Candidate {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Cut one day window into consecutive `step`-long slots.
///
/// A slot starting in a DST gap is dropped or, under
/// [`DstPolicy::ShiftForward`], moved to the first valid local time; the
/// next slot follows the moved one. Slots that would end in a gap or past
/// the window end are dropped.
fn slots_in_window(window: &DayWindow, step: Duration, policy: DstPolicy) -> Vec<Candidate> {
    let mut slots = Vec::new();
    let window_end = window.local_end();
    let mut local = window.local_start();
    while local + step <= window_end {
        let next = match span_to_utc(window.timezone, local, step, policy) {
            Some(span) if span.local_end <= window_end => {
                slots.push(Candidate {
                    start: span.start,
                    end: span.end,
                    time_slot_id: None,
                    capacity: None,
                });
                span.local_end
            }
            _ => local + step,
        };
        local = next;
    }
    slots
}

fn finish(mut candidates: Vec<Candidate>, range: TimeRange) -> Vec<Candidate> {
    candidates.retain(|c| c.start >= range.start && c.start < range.end);
    candidates.sort_by(|a, b| {
        (a.start, a.end, &a.time_slot_id).cmp(&(b.start, b.end, &b.time_slot_id))
    });
    candidates.dedup();
    candidates
}

/// Candidate slots generated from weekly rules and overrides.
pub fn generate_candidates(
    rule_book: &RuleBook,
    event_type: &EventType,
    range: TimeRange,
    tz_override: Option<Tz>,
    policy: DstPolicy,
) -> Result<Vec<Candidate>> {
    event_type.validate()?;
    let step = event_type.duration();

    let mut candidates = Vec::new();
    for date in range.covering_dates() {
        for window in rule_book.effective_day_windows(date, tz_override)? {
            candidates.extend(slots_in_window(&window, step, policy));
        }
    }

    let candidates = finish(candidates, range);
    debug!(
        event_type_id = %event_type.id,
        count = candidates.len(),
        "generated rule candidates"
    );
    Ok(candidates)
}

/// Candidate sessions generated from an event type's fixed TimeSlots.
///
/// Sessions without their own timezone use `default_tz`. Dates blocked by an
/// unavailable override produce no sessions.
pub fn generate_session_candidates(
    rule_book: &RuleBook,
    event_type: &EventType,
    slots: &[TimeSlot],
    range: TimeRange,
    tz_override: Option<Tz>,
    default_tz: Tz,
    policy: DstPolicy,
) -> Result<Vec<Candidate>> {
    event_type.validate()?;
    let first = range.start.date_naive() - Duration::days(1);
    let last = range.end.date_naive() + Duration::days(1);

    let mut candidates = Vec::new();
    for slot in slots.iter().filter(|s| s.event_type_id == event_type.id) {
        slot.validate()?;
        let tz = match (tz_override, &slot.timezone) {
            (Some(tz), _) => tz,
            (None, Some(name)) => parse_timezone(name, &slot.id)?,
            (None, None) => default_tz,
        };
        let length = slot.end_time - slot.start_time;

        for local in expand_sessions(slot, tz, first, last)? {
            if rule_book.is_blocked(local.date())? {
                continue;
            }
            if let Some(candidate) = session_candidate(slot, tz, local, length, policy) {
                candidates.push(candidate);
            }
        }
    }

    let candidates = finish(candidates, range);
    debug!(
        event_type_id = %event_type.id,
        count = candidates.len(),
        "generated session candidates"
    );
    Ok(candidates)
}

fn session_candidate(
    slot: &TimeSlot,
    tz: Tz,
    local: NaiveDateTime,
    length: Duration,
    policy: DstPolicy,
) -> Option<Candidate> {
    let span = span_to_utc(tz, local, length, policy)?;
    Some(Candidate {
        start: span.start,
        end: span.end,
        time_slot_id: Some(slot.id.clone()),
        capacity: slot.capacity(),
    })
}

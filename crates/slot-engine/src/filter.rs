//! Slot filtering: minimum notice, booking window, buffers and conflicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conflict::ConflictIndex;
use crate::generator::Candidate;
use crate::model::EventType;

/// A window that can be booked, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookableWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot_id: Option<String>,
    /// Remaining seats of a capacity-limited session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spots_left: Option<u32>,
}

/// Apply booking constraints to `candidates`, returning bookable windows in start order.
///
/// A candidate is dropped when it starts before `now + minimum_notice_hours`,
/// starts after `now + booking_window_days`, or when its buffered interval
/// `[start - buffer_before, end + buffer_after]` overlaps a blocking interval.
/// Returned windows never overlap one another.
pub fn filter_bookable(
    candidates: &[Candidate],
    conflicts: &ConflictIndex,
    event_type: &EventType,
    now: DateTime<Utc>,
) -> Vec<BookableWindow> {
    if !event_type.is_active {
        return Vec::new();
    }

    // A bound past the representable range means no bound at that end.
    let Some(earliest) = now.checked_add_signed(event_type.minimum_notice()) else {
        return Vec::new();
    };
    let latest = now.checked_add_signed(event_type.booking_window());
    let (before, after) = (event_type.buffer_before(), event_type.buffer_after());

    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| (c.start, c.end));

    let mut bookable: Vec<BookableWindow> = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        if candidate.start < earliest || latest.is_some_and(|latest| candidate.start > latest) {
            continue;
        }
        if conflicts.blocks(&candidate.range().padded(before, after)) {
            continue;
        }

        let spots_left = match (&candidate.time_slot_id, candidate.capacity) {
            (Some(slot_id), Some(capacity)) => {
                let left = capacity.saturating_sub(conflicts.booked_seats(slot_id, candidate.start));
                if left == 0 {
                    continue;
                }
                Some(left)
            }
            _ => None,
        };

        if bookable.last().is_some_and(|prev| candidate.start < prev.end) {
            continue;
        }
        bookable.push(BookableWindow {
            start: candidate.start,
            end: candidate.end,
            time_slot_id: candidate.time_slot_id.clone(),
            spots_left,
        });
    }

    debug!(
        event_type_id = %event_type.id,
        candidates = candidates.len(),
        bookable = bookable.len(),
        "filtered candidates"
    );
    bookable
}

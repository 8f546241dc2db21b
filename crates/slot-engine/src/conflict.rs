//! Booking conflict index: absolute intervals during which a host is taken.
//!
//! A scheduled booking blocks `[start_at - buffer_before, end_at + buffer_after]`
//! using its own event type's buffers. Bookings of a capacity-limited session
//! only block once the session is full; sessions with unlimited capacity never
//! block. Canceled bookings never block.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SlotError};
use crate::interval::merge_intervals;
use crate::model::{Booking, EventType, TimeRange, TimeSlot};
use crate::store::AvailabilityStore;

/// An interval blocked by one scheduled booking, buffers included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockingInterval {
    pub booking_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictIndex {
    /// Sorted by `(start, end)`.
    intervals: Vec<BlockingInterval>,
    /// Disjoint union of `intervals`, used for overlap queries.
    merged: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    /// Seats taken per `(time_slot_id, session start)`.
    session_seats: HashMap<(String, DateTime<Utc>), u32>,
}

impl ConflictIndex {
    /// Build the index from already-fetched records.
    ///
    /// `event_types` and `time_slots` are keyed by id and supply buffers and capacities.
    pub fn build(
        bookings: &[Booking],
        event_types: &HashMap<String, EventType>,
        time_slots: &HashMap<String, TimeSlot>,
    ) -> Self {
        let scheduled: Vec<&Booking> = bookings.iter().filter(|b| b.is_scheduled()).collect();

        let mut session_seats: HashMap<(String, DateTime<Utc>), u32> = HashMap::new();
        for booking in &scheduled {
            if let Some(slot_id) = &booking.time_slot_id {
                *session_seats
                    .entry((slot_id.clone(), booking.start_at))
                    .or_insert(0) += booking.seats();
            }
        }

        let mut intervals = Vec::with_capacity(scheduled.len());
        for booking in scheduled {
            if let Some(slot_id) = &booking.time_slot_id {
                match time_slots.get(slot_id).map(TimeSlot::capacity) {
                    Some(None) => continue,
                    Some(Some(capacity)) => {
                        let taken = session_seats
                            .get(&(slot_id.clone(), booking.start_at))
                            .copied()
                            .unwrap_or(0);
                        if taken < capacity {
                            continue;
                        }
                    }
                    None => warn!(
                        booking_id = %booking.id,
                        time_slot_id = %slot_id,
                        "booking references an unknown time slot; treating it as exclusive"
                    ),
                }
            }

            let (before, after) = match event_types.get(&booking.event_type_id) {
                Some(et) => (et.buffer_before(), et.buffer_after()),
                None => {
                    warn!(
                        booking_id = %booking.id,
                        event_type_id = %booking.event_type_id,
                        "booking references an unknown event type; blocking without buffers"
                    );
                    (Duration::zero(), Duration::zero())
                }
            };

            intervals.push(BlockingInterval {
                booking_id: booking.id.clone(),
                start: booking.start_at - before,
                end: booking.end_at + after,
            });
        }

        intervals.sort_by_key(|i| (i.start, i.end));
        let merged = merge_intervals(intervals.iter().map(|i| (i.start, i.end)).collect());

        Self {
            intervals,
            merged,
            session_seats,
        }
    }

    /// Fetch a host's scheduled bookings around `range` and index them.
    ///
    /// The fetch window is widened by twice the largest buffer among the host's
    /// event types, so bookings whose buffers reach into the range are included.
    pub fn load<S: AvailabilityStore + ?Sized>(
        store: &S,
        user_id: &str,
        range: TimeRange,
    ) -> Result<Self> {
        let event_types: HashMap<String, EventType> = store
            .list_event_types(user_id)
            .map_err(SlotError::store(format!("event_types for user {user_id}")))?
            .into_iter()
            .map(|et| (et.id.clone(), et))
            .collect();

        let max_buffer = event_types
            .values()
            .map(|et| et.buffer_before().max(et.buffer_after()))
            .max()
            .unwrap_or_else(Duration::zero);
        let window = range.padded(max_buffer * 2, max_buffer * 2);

        let bookings = store
            .list_scheduled_bookings(user_id, window)
            .map_err(SlotError::store(format!("bookings for user {user_id}")))?;

        let session_event_types: BTreeSet<&str> = bookings
            .iter()
            .filter(|b| b.time_slot_id.is_some())
            .map(|b| b.event_type_id.as_str())
            .collect();
        let mut time_slots = HashMap::new();
        for event_type_id in session_event_types {
            let slots = store
                .list_time_slots(event_type_id)
                .map_err(SlotError::store(format!(
                    "event_type_time_slots for event type {event_type_id}"
                )))?;
            time_slots.extend(slots.into_iter().map(|s| (s.id.clone(), s)));
        }

        let index = Self::build(&bookings, &event_types, &time_slots);
        debug!(
            user_id,
            bookings = bookings.len(),
            blocking = index.intervals.len(),
            "built conflict index"
        );
        Ok(index)
    }

    pub fn blocking_intervals(&self) -> &[BlockingInterval] {
        &self.intervals
    }

    /// Whether `range` overlaps any blocking interval (half-open test).
    pub fn blocks(&self, range: &TimeRange) -> bool {
        let idx = self.merged.partition_point(|(_, end)| *end <= range.start);
        self.merged
            .get(idx)
            .is_some_and(|(start, _)| *start < range.end)
    }

    /// The first booking whose blocking interval overlaps `range`.
    pub fn first_conflict(&self, range: &TimeRange) -> Option<&BlockingInterval> {
        self.intervals.iter().find(|i| {
            range.overlaps(&TimeRange {
                start: i.start,
                end: i.end,
            })
        })
    }

    /// Seats already taken in the session of `time_slot_id` starting at `start`.
    pub fn booked_seats(&self, time_slot_id: &str, start: DateTime<Utc>) -> u32 {
        self.session_seats
            .get(&(time_slot_id.to_string(), start))
            .copied()
            .unwrap_or(0)
    }
}

/// Blocking intervals for `user_id` relevant to `range`, buffers applied.
pub fn get_blocking_intervals<S: AvailabilityStore + ?Sized>(
    store: &S,
    user_id: &str,
    range: TimeRange,
) -> Result<Vec<BlockingInterval>> {
    Ok(ConflictIndex::load(store, user_id, range)?.intervals)
}

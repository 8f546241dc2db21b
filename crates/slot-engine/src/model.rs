//! Records read by the resolver.
//!
//! Field names follow the persisted tables (`availability_rules`,
//! `availability_overrides`, `event_types`, `event_type_time_slots`,
//! `bookings`). Integer columns are signed so that corrupt rows can be
//! loaded and reported by `validate()` instead of failing deserialization.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dst::parse_timezone;
use crate::error::{Result, SlotError};

/// A host: the user who owns event types and receives bookings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    /// IANA zone the host works in.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub company_profile_id: Option<String>,
}

/// A recurring weekly availability window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: String,
    #[serde(default)]
    pub company_profile_id: Option<String>,
    pub user_id: String,
    /// `None` applies the rule to every event type of the user.
    #[serde(default)]
    pub event_type_id: Option<String>,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub timezone: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AvailabilityRule {
    pub fn validate(&self) -> Result<()> {
        if !(0..=6).contains(&self.day_of_week) {
            return Err(SlotError::config(
                &self.id,
                format!("day_of_week {} outside 0..=6", self.day_of_week),
            ));
        }
        if self.start_time >= self.end_time {
            return Err(SlotError::config(
                &self.id,
                format!("start_time {} is not before end_time {}", self.start_time, self.end_time),
            ));
        }
        parse_timezone(&self.timezone, &self.id)?;
        Ok(())
    }
}

/// A date-specific exception that takes precedence over weekly rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityOverride {
    pub id: String,
    #[serde(default)]
    pub company_profile_id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub event_type_id: Option<String>,
    pub date: NaiveDate,
    pub is_unavailable: bool,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub timezone: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AvailabilityOverride {
    pub fn validate(&self) -> Result<()> {
        parse_timezone(&self.timezone, &self.id)?;
        if self.is_unavailable {
            return Ok(());
        }
        self.replacement_window()
            .map(|_| ())
            .ok_or_else(|| {
                SlotError::config(
                    &self.id,
                    "available override needs start_time before end_time",
                )
            })
    }

    /// The replacement window of an available override, if well formed.
    pub fn replacement_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// Start times are generated from weekly rules and overrides.
    #[default]
    Rules,
    /// Start times are the event type's fixed TimeSlots.
    FixedSlots,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
}

/// A bookable service definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventType {
    pub id: String,
    pub owner_user_id: String,
    pub slug: String,
    pub title: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub buffer_before_minutes: i32,
    #[serde(default)]
    pub buffer_after_minutes: i32,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub location_value: Option<String>,
    #[serde(default)]
    pub minimum_notice_hours: i32,
    #[serde(default = "default_booking_window_days")]
    pub booking_window_days: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub scheduling: SchedulingMode,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_booking_window_days() -> i32 {
    60
}

fn default_true() -> bool {
    true
}

impl EventType {
    pub fn validate(&self) -> Result<()> {
        if self.duration_minutes <= 0 {
            return Err(SlotError::config(
                &self.id,
                format!("duration_minutes must be positive, got {}", self.duration_minutes),
            ));
        }
        if self.buffer_before_minutes < 0 || self.buffer_after_minutes < 0 {
            return Err(SlotError::config(&self.id, "buffers must not be negative"));
        }
        if self.minimum_notice_hours < 0 {
            return Err(SlotError::config(
                &self.id,
                "minimum_notice_hours must not be negative",
            ));
        }
        if self.booking_window_days < 1 {
            return Err(SlotError::config(
                &self.id,
                "booking_window_days must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn buffer_before(&self) -> Duration {
        Duration::minutes(i64::from(self.buffer_before_minutes.max(0)))
    }

    pub fn buffer_after(&self) -> Duration {
        Duration::minutes(i64::from(self.buffer_after_minutes.max(0)))
    }

    pub fn minimum_notice(&self) -> Duration {
        Duration::hours(i64::from(self.minimum_notice_hours.max(0)))
    }

    pub fn booking_window(&self) -> Duration {
        Duration::days(i64::from(self.booking_window_days.max(1)))
    }
}

/// A fixed recurring session of an event type (`event_type_time_slots`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub event_type_id: String,
    /// `None` repeats the session every day.
    #[serde(default)]
    pub day_of_week: Option<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub timezone: Option<String>,
    /// `None` means unlimited participants.
    #[serde(default)]
    pub max_participants: Option<i32>,
}

impl TimeSlot {
    pub fn validate(&self) -> Result<()> {
        if let Some(day) = self.day_of_week {
            if !(0..=6).contains(&day) {
                return Err(SlotError::config(
                    &self.id,
                    format!("day_of_week {day} outside 0..=6"),
                ));
            }
        }
        if self.start_time >= self.end_time {
            return Err(SlotError::config(
                &self.id,
                "start_time must be before end_time",
            ));
        }
        if let Some(tz) = &self.timezone {
            parse_timezone(tz, &self.id)?;
        }
        if matches!(self.max_participants, Some(max) if max < 1) {
            return Err(SlotError::config(
                &self.id,
                "max_participants must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn capacity(&self) -> Option<u32> {
        self.max_participants.map(|max| max.max(0) as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Scheduled,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitee {
    pub name: String,
    pub email: String,
}

/// A reservation of a generated window or a fixed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub event_type_id: String,
    pub host_user_id: String,
    pub invitee: Invitee,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub cancel_reason: Option<String>,
    #[serde(default)]
    pub cancel_token: Option<String>,
    #[serde(default)]
    pub reschedule_token: Option<String>,
    #[serde(default)]
    pub time_slot_id: Option<String>,
    #[serde(default = "default_participants")]
    pub number_of_participants: i32,
    #[serde(default)]
    pub participant_names: Vec<String>,
}

fn default_participants() -> i32 {
    1
}

impl Booking {
    pub fn is_scheduled(&self) -> bool {
        self.status == BookingStatus::Scheduled
    }

    /// Seats this booking takes in a capacity-limited session.
    pub fn seats(&self) -> u32 {
        self.number_of_participants.max(1) as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_at >= self.end_at {
            return Err(SlotError::config(&self.id, "start_at must be before end_at"));
        }
        Ok(())
    }
}

/// Half-open interval of absolute time, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted bounds.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(SlotError::Validation(format!(
                "range end {end} must be after range start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Overlap iff `a.start < b.end && b.start < a.end`; touching ranges do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn padded(&self, before: Duration, after: Duration) -> TimeRange {
        TimeRange {
            start: self.start - before,
            end: self.end + after,
        }
    }

    /// Calendar dates (UTC) touched by the range, padded by one day on each side
    /// so that every zone's local date is covered.
    pub fn covering_dates(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.start.date_naive() - Duration::days(1);
        let last = self.end.date_naive() + Duration::days(1);
        first.iter_days().take_while(move |d| *d <= last)
    }
}

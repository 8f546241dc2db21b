//! Read contract consumed by the resolver, and an in-memory implementation.
//!
//! The in-memory store also carries the booking write path: the conflict
//! check and the insert happen under one write lock, so of two concurrent
//! requests for the same window at most one succeeds. Resolver output is a
//! snapshot and is never trusted for that decision.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::AvailabilityCache;
use crate::config::ResolverConfig;
use crate::conflict::ConflictIndex;
use crate::dst::{span_to_utc, DstPolicy};
use crate::error::{BookingError, Result, SlotError, StoreError};
use crate::model::{
    AvailabilityOverride, AvailabilityRule, Booking, BookingStatus, EventType, Host, Invitee,
    TimeRange, TimeSlot,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }
}

/// Read access to the persisted scheduling tables.
///
/// Implementations may block on I/O; timeouts and connectivity failures are
/// reported as [`StoreError`] and never retried by the resolver.
pub trait AvailabilityStore {
    fn get_host(&self, user_id: &str) -> StoreResult<Option<Host>>;

    fn get_event_type(&self, id: &str) -> StoreResult<Option<EventType>>;

    /// Every event type owned by `user_id`.
    fn list_event_types(&self, user_id: &str) -> StoreResult<Vec<EventType>>;

    /// Rules of `user_id`; with `Some(event_type_id)`, only rules for that
    /// event type or for all event types.
    fn list_availability_rules(
        &self,
        user_id: &str,
        event_type_id: Option<&str>,
    ) -> StoreResult<Vec<AvailabilityRule>>;

    fn list_availability_overrides(
        &self,
        user_id: &str,
        event_type_id: Option<&str>,
        dates: Option<DateRange>,
    ) -> StoreResult<Vec<AvailabilityOverride>>;

    fn list_time_slots(&self, event_type_id: &str) -> StoreResult<Vec<TimeSlot>>;

    /// Scheduled (non-canceled) bookings of `user_id` overlapping `range`.
    fn list_scheduled_bookings(&self, user_id: &str, range: TimeRange)
        -> StoreResult<Vec<Booking>>;
}

macro_rules! forward_store {
    ($($ptr:ty),*) => {$(
        impl<T: AvailabilityStore + ?Sized> AvailabilityStore for $ptr {
            fn get_host(&self, user_id: &str) -> StoreResult<Option<Host>> {
                (**self).get_host(user_id)
            }

            fn get_event_type(&self, id: &str) -> StoreResult<Option<EventType>> {
                (**self).get_event_type(id)
            }

            fn list_event_types(&self, user_id: &str) -> StoreResult<Vec<EventType>> {
                (**self).list_event_types(user_id)
            }

            fn list_availability_rules(
                &self,
                user_id: &str,
                event_type_id: Option<&str>,
            ) -> StoreResult<Vec<AvailabilityRule>> {
                (**self).list_availability_rules(user_id, event_type_id)
            }

            fn list_availability_overrides(
                &self,
                user_id: &str,
                event_type_id: Option<&str>,
                dates: Option<DateRange>,
            ) -> StoreResult<Vec<AvailabilityOverride>> {
                (**self).list_availability_overrides(user_id, event_type_id, dates)
            }

            fn list_time_slots(&self, event_type_id: &str) -> StoreResult<Vec<TimeSlot>> {
                (**self).list_time_slots(event_type_id)
            }

            fn list_scheduled_bookings(
                &self,
                user_id: &str,
                range: TimeRange,
            ) -> StoreResult<Vec<Booking>> {
                (**self).list_scheduled_bookings(user_id, range)
            }
        }
    )*};
}

forward_store!(&T, Arc<T>, Box<T>);

/// Serializable dump of all tables, used for fixtures and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub event_types: Vec<EventType>,
    #[serde(default)]
    pub availability_rules: Vec<AvailabilityRule>,
    #[serde(default)]
    pub availability_overrides: Vec<AvailabilityOverride>,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl StoreSnapshot {
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// References to hosts, event types or time slots that do not exist.
    pub fn dangling_references(&self) -> Vec<SlotError> {
        let hosts: BTreeSet<&str> = self.hosts.iter().map(|h| h.id.as_str()).collect();
        let event_types: BTreeSet<&str> = self.event_types.iter().map(|e| e.id.as_str()).collect();
        let time_slots: BTreeSet<&str> = self.time_slots.iter().map(|s| s.id.as_str()).collect();

        let mut errors = Vec::new();
        for et in &self.event_types {
            check_ref(&mut errors, &et.id, "host", &et.owner_user_id, &hosts);
        }
        for rule in &self.availability_rules {
            check_ref(&mut errors, &rule.id, "host", &rule.user_id, &hosts);
            if let Some(et) = &rule.event_type_id {
                check_ref(&mut errors, &rule.id, "event type", et, &event_types);
            }
        }
        for o in &self.availability_overrides {
            check_ref(&mut errors, &o.id, "host", &o.user_id, &hosts);
            if let Some(et) = &o.event_type_id {
                check_ref(&mut errors, &o.id, "event type", et, &event_types);
            }
        }
        for slot in &self.time_slots {
            check_ref(&mut errors, &slot.id, "event type", &slot.event_type_id, &event_types);
        }
        for b in &self.bookings {
            check_ref(&mut errors, &b.id, "host", &b.host_user_id, &hosts);
            check_ref(&mut errors, &b.id, "event type", &b.event_type_id, &event_types);
            if let Some(slot) = &b.time_slot_id {
                check_ref(&mut errors, &b.id, "time slot", slot, &time_slots);
            }
        }
        errors
    }

    /// Every dangling reference and every record failing its own validation.
    pub fn lint(&self) -> Vec<SlotError> {
        let mut errors = self.dangling_references();
        errors.extend(self.event_types.iter().filter_map(|r| r.validate().err()));
        errors.extend(self.availability_rules.iter().filter_map(|r| r.validate().err()));
        errors.extend(self.availability_overrides.iter().filter_map(|r| r.validate().err()));
        errors.extend(self.time_slots.iter().filter_map(|r| r.validate().err()));
        errors.extend(self.bookings.iter().filter_map(|r| r.validate().err()));
        errors
    }
}

fn check_ref(
    errors: &mut Vec<SlotError>,
    entity_id: &str,
    kind: &str,
    target: &str,
    known: &BTreeSet<&str>,
) {
    if !known.contains(target) {
        errors.push(SlotError::config(
            entity_id,
            format!("references unknown {kind} {target}"),
        ));
    }
}

/// Request to create a booking through [`InMemoryStore::create_booking`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    pub id: String,
    pub event_type_id: String,
    pub invitee: Invitee,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub time_slot_id: Option<String>,
    #[serde(default = "one")]
    pub number_of_participants: i32,
    #[serde(default)]
    pub participant_names: Vec<String>,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Default)]
struct Tables {
    hosts: HashMap<String, Host>,
    event_types: HashMap<String, EventType>,
    rules: Vec<AvailabilityRule>,
    overrides: Vec<AvailabilityOverride>,
    time_slots: HashMap<String, TimeSlot>,
    bookings: Vec<Booking>,
}

#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    cache: Option<Arc<AvailabilityCache>>,
    /// Zone of sessions when neither the session nor its host names one.
    session_tz: Tz,
    dst_policy: DstPolicy,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            tables: RwLock::default(),
            cache: None,
            session_tz: Tz::UTC,
            dst_policy: DstPolicy::default(),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot, rejecting it if any record references a missing row.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        if let Some(err) = snapshot.dangling_references().into_iter().next() {
            return Err(err);
        }
        let tables = Tables {
            hosts: snapshot.hosts.into_iter().map(|h| (h.id.clone(), h)).collect(),
            event_types: snapshot
                .event_types
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
            rules: snapshot.availability_rules,
            overrides: snapshot.availability_overrides,
            time_slots: snapshot
                .time_slots
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
            bookings: snapshot.bookings,
        };
        Ok(Self {
            tables: RwLock::new(tables),
            ..Self::default()
        })
    }

    /// Place sessions the way a resolver built from `config` does, so that
    /// every session it offers can be booked.
    pub fn with_resolver_config(mut self, config: &ResolverConfig) -> Result<Self> {
        self.session_tz = config.default_tz()?;
        self.dst_policy = config.dst_policy;
        Ok(self)
    }

    /// Invalidate `cache` entries whenever this store is written to.
    pub fn with_cache(mut self, cache: Arc<AvailabilityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let t = self.read()?;
        let mut snapshot = StoreSnapshot {
            hosts: t.hosts.values().cloned().collect(),
            event_types: t.event_types.values().cloned().collect(),
            availability_rules: t.rules.clone(),
            availability_overrides: t.overrides.clone(),
            time_slots: t.time_slots.values().cloned().collect(),
            bookings: t.bookings.clone(),
        };
        snapshot.hosts.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.event_types.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.time_slots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snapshot)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unreachable("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unreachable("store lock poisoned".into()))
    }

    fn invalidate(&self, user_id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_user(user_id);
        }
    }

    pub fn upsert_host(&self, host: Host) -> StoreResult<()> {
        let user_id = host.id.clone();
        self.write()?.hosts.insert(user_id.clone(), host);
        self.invalidate(&user_id);
        Ok(())
    }

    pub fn upsert_event_type(&self, event_type: EventType) -> StoreResult<()> {
        let user_id = event_type.owner_user_id.clone();
        let replaced = self
            .write()?
            .event_types
            .insert(event_type.id.clone(), event_type);
        self.invalidate(&user_id);
        if let Some(previous) = replaced.filter(|p| p.owner_user_id != user_id) {
            self.invalidate(&previous.owner_user_id);
        }
        Ok(())
    }

    pub fn upsert_rule(&self, rule: AvailabilityRule) -> StoreResult<()> {
        let user_id = rule.user_id.clone();
        {
            let mut t = self.write()?;
            t.rules.retain(|r| r.id != rule.id);
            t.rules.push(rule);
        }
        self.invalidate(&user_id);
        Ok(())
    }

    /// Returns whether a rule was removed.
    pub fn remove_rule(&self, id: &str) -> StoreResult<bool> {
        let removed = {
            let mut t = self.write()?;
            let idx = t.rules.iter().position(|r| r.id == id);
            idx.map(|i| t.rules.remove(i))
        };
        if let Some(rule) = &removed {
            self.invalidate(&rule.user_id);
        }
        Ok(removed.is_some())
    }

    pub fn upsert_override(&self, o: AvailabilityOverride) -> StoreResult<()> {
        let user_id = o.user_id.clone();
        {
            let mut t = self.write()?;
            t.overrides.retain(|x| x.id != o.id);
            t.overrides.push(o);
        }
        self.invalidate(&user_id);
        Ok(())
    }

    pub fn upsert_time_slot(&self, slot: TimeSlot) -> StoreResult<()> {
        let owners = {
            let mut t = self.write()?;
            let mut event_type_ids = vec![slot.event_type_id.clone()];
            if let Some(previous) = t.time_slots.insert(slot.id.clone(), slot) {
                event_type_ids.push(previous.event_type_id);
            }
            let owners: BTreeSet<String> = event_type_ids
                .iter()
                .filter_map(|id| t.event_types.get(id))
                .map(|et| et.owner_user_id.clone())
                .collect();
            owners
        };
        for user_id in &owners {
            self.invalidate(user_id);
        }
        Ok(())
    }

    /// Insert a booking after an authoritative conflict check.
    ///
    /// Duration-based bookings end `duration_minutes` after `start_at`;
    /// session bookings end at the session's end time. The new booking's
    /// buffered interval must not overlap any blocking interval of the host,
    /// and a capacity-limited session must have enough seats left.
    pub fn create_booking(&self, new: NewBooking) -> std::result::Result<Booking, BookingError> {
        let booking = {
            let mut t = self.write()?;
            let et = t
                .event_types
                .get(&new.event_type_id)
                .cloned()
                .ok_or_else(|| BookingError::UnknownEventType(new.event_type_id.clone()))?;
            if !et.is_active {
                return Err(BookingError::Invalid(format!(
                    "event type {} is not active",
                    et.id
                )));
            }
            et.validate()
                .map_err(|e| BookingError::Invalid(e.to_string()))?;
            if t.bookings.iter().any(|b| b.id == new.id) {
                return Err(BookingError::Invalid(format!("duplicate booking id {}", new.id)));
            }

            let slot = match &new.time_slot_id {
                Some(slot_id) => Some(
                    t.time_slots
                        .get(slot_id)
                        .filter(|s| s.event_type_id == et.id)
                        .cloned()
                        .ok_or_else(|| BookingError::UnknownTimeSlot(slot_id.clone()))?,
                ),
                None => None,
            };
            let end_at = match &slot {
                None => new.start_at + et.duration(),
                Some(slot) => {
                    let host_tz = t.hosts.get(&et.owner_user_id).and_then(|h| h.timezone.as_deref());
                    let tz = match slot.timezone.as_deref().or(host_tz) {
                        Some(name) => name.parse::<Tz>().map_err(|_| {
                            BookingError::Invalid(format!("invalid timezone '{name}'"))
                        })?,
                        None => self.session_tz,
                    };
                    session_end(slot, tz, self.dst_policy, new.start_at)?
                }
            };
            let range = TimeRange::new(new.start_at, end_at)
                .map_err(|e| BookingError::Invalid(e.to_string()))?;

            let host_bookings: Vec<Booking> = t
                .bookings
                .iter()
                .filter(|b| b.host_user_id == et.owner_user_id && b.is_scheduled())
                .cloned()
                .collect();
            let index = ConflictIndex::build(&host_bookings, &t.event_types, &t.time_slots);

            let seats = new.number_of_participants.max(1) as u32;
            if let Some(slot) = &slot {
                if let Some(capacity) = slot.capacity() {
                    if index.booked_seats(&slot.id, new.start_at) + seats > capacity {
                        return Err(BookingError::SessionFull(slot.id.clone()));
                    }
                }
            }
            let padded = range.padded(et.buffer_before(), et.buffer_after());
            if let Some(hit) = index.first_conflict(&padded) {
                return Err(BookingError::Conflict(hit.booking_id.clone()));
            }

            let booking = Booking {
                id: new.id,
                event_type_id: et.id.clone(),
                host_user_id: et.owner_user_id.clone(),
                invitee: new.invitee,
                start_at: range.start,
                end_at: range.end,
                status: BookingStatus::Scheduled,
                cancel_reason: None,
                cancel_token: None,
                reschedule_token: None,
                time_slot_id: new.time_slot_id,
                number_of_participants: seats as i32,
                participant_names: new.participant_names,
            };
            t.bookings.push(booking.clone());
            booking
        };
        info!(booking_id = %booking.id, host = %booking.host_user_id, start = %booking.start_at, "booking created");
        self.invalidate(&booking.host_user_id);
        Ok(booking)
    }

    /// Cancel a scheduled booking. Cancellation is terminal.
    pub fn cancel_booking(
        &self,
        id: &str,
        reason: Option<String>,
    ) -> std::result::Result<Booking, BookingError> {
        let booking = {
            let mut t = self.write()?;
            let booking = t
                .bookings
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or_else(|| BookingError::NotFound(id.to_string()))?;
            if booking.status == BookingStatus::Canceled {
                return Err(BookingError::AlreadyCanceled(id.to_string()));
            }
            booking.status = BookingStatus::Canceled;
            booking.cancel_reason = reason;
            booking.clone()
        };
        info!(booking_id = %booking.id, "booking canceled");
        self.invalidate(&booking.host_user_id);
        Ok(booking)
    }
}

/// End instant of the session of `slot` that starts at `start_at`.
///
/// The session is placed in `tz` under `policy`, as generation places it.
fn session_end(
    slot: &TimeSlot,
    tz: Tz,
    policy: DstPolicy,
    start_at: DateTime<Utc>,
) -> std::result::Result<DateTime<Utc>, BookingError> {
    let day = start_at.with_timezone(&tz).date_naive();
    let length = slot.end_time - slot.start_time;
    // A session shifted out of a gap starts on the same local date.
    match span_to_utc(tz, day.and_time(slot.start_time), length, policy) {
        Some(span) if span.start == start_at => Ok(span.end),
        _ => Err(BookingError::Invalid(format!(
            "{start_at} is not a start of session {}",
            slot.id
        ))),
    }
}

impl AvailabilityStore for InMemoryStore {
    fn get_host(&self, user_id: &str) -> StoreResult<Option<Host>> {
        Ok(self.read()?.hosts.get(user_id).cloned())
    }

    fn get_event_type(&self, id: &str) -> StoreResult<Option<EventType>> {
        Ok(self.read()?.event_types.get(id).cloned())
    }

    fn list_event_types(&self, user_id: &str) -> StoreResult<Vec<EventType>> {
        let t = self.read()?;
        let mut types: Vec<EventType> = t
            .event_types
            .values()
            .filter(|et| et.owner_user_id == user_id)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(types)
    }

    fn list_availability_rules(
        &self,
        user_id: &str,
        event_type_id: Option<&str>,
    ) -> StoreResult<Vec<AvailabilityRule>> {
        let t = self.read()?;
        Ok(t.rules
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| match (event_type_id, r.event_type_id.as_deref()) {
                (Some(wanted), Some(own)) => wanted == own,
                _ => true,
            })
            .cloned()
            .collect())
    }

    fn list_availability_overrides(
        &self,
        user_id: &str,
        event_type_id: Option<&str>,
        dates: Option<DateRange>,
    ) -> StoreResult<Vec<AvailabilityOverride>> {
        let t = self.read()?;
        Ok(t.overrides
            .iter()
            .filter(|o| o.user_id == user_id)
            .filter(|o| match (event_type_id, o.event_type_id.as_deref()) {
                (Some(wanted), Some(own)) => wanted == own,
                _ => true,
            })
            .filter(|o| dates.is_none_or(|d| d.contains(o.date)))
            .cloned()
            .collect())
    }

    fn list_time_slots(&self, event_type_id: &str) -> StoreResult<Vec<TimeSlot>> {
        let t = self.read()?;
        let mut slots: Vec<TimeSlot> = t
            .time_slots
            .values()
            .filter(|s| s.event_type_id == event_type_id)
            .cloned()
            .collect();
        slots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(slots)
    }

    fn list_scheduled_bookings(
        &self,
        user_id: &str,
        range: TimeRange,
    ) -> StoreResult<Vec<Booking>> {
        let t = self.read()?;
        let bookings: Vec<Booking> = t
            .bookings
            .iter()
            .filter(|b| b.host_user_id == user_id && b.is_scheduled())
            .filter(|b| b.start_at < range.end && range.start < b.end_at)
            .cloned()
            .collect();
        debug!(user_id, count = bookings.len(), "listed scheduled bookings");
        Ok(bookings)
    }
}

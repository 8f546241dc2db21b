//! Availability resolution: the public entry point.
//!
//! A query is validated before any store access, then rules, overrides and
//! bookings are read, candidates generated and filtered. The resolver keeps
//! no mutable state of its own besides the optional cache, so one instance
//! can serve concurrent queries. Its output is a snapshot; the authoritative
//! conflict check happens when a booking is inserted.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cache::{AvailabilityCache, CacheKey};
use crate::config::ResolverConfig;
use crate::conflict::ConflictIndex;
use crate::dst::parse_timezone;
use crate::error::{Result, SlotError};
use crate::filter::{filter_bookable, BookableWindow};
use crate::generator::{generate_candidates, generate_session_candidates, Candidate};
use crate::model::{EventType, SchedulingMode, TimeRange};
use crate::rules::{get_effective_day_windows, DayWindow, RuleBook};
use crate::store::{AvailabilityStore, DateRange};

/// A request for the bookable windows of one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub user_id: String,
    pub event_type_id: String,
    /// Inclusive.
    pub range_start: DateTime<Utc>,
    /// Exclusive.
    pub range_end: DateTime<Utc>,
    /// Reinterprets every rule, override and session in this zone.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub company_profile_id: Option<String>,
}

/// Bookable windows, sorted by start and non-overlapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub windows: Vec<BookableWindow>,
}

impl Availability {
    /// Message shown on the booking page for an empty, successful result.
    pub const EMPTY_MESSAGE: &'static str = "No available times in this range.";

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// The pre-filter stage of a query: everything but the `now`-dependent checks.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub event_type: EventType,
    pub candidates: Vec<Candidate>,
    pub conflicts: ConflictIndex,
}

#[derive(Debug)]
pub struct Resolver<S> {
    store: S,
    config: ResolverConfig,
    default_tz: Tz,
    cache: Option<Arc<AvailabilityCache>>,
}

impl<S: AvailabilityStore> Resolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: ResolverConfig::default(),
            default_tz: Tz::UTC,
            cache: None,
        }
    }

    /// Build a resolver from a validated config; a configured TTL enables caching.
    pub fn with_config(store: S, config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let default_tz = config.default_tz()?;
        let cache = config
            .cache_ttl()
            .map(|ttl| Arc::new(AvailabilityCache::new(ttl)));
        Ok(Self {
            store,
            config,
            default_tz,
            cache,
        })
    }

    /// Share `cache` with this resolver, e.g. one also attached to the store's write path.
    pub fn with_cache(mut self, cache: Arc<AvailabilityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<AvailabilityCache>> {
        self.cache.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve bookable windows as of the current time.
    pub fn resolve_availability(&self, request: &AvailabilityRequest) -> Result<Availability> {
        self.resolve_at(request, Utc::now())
    }

    /// Resolve bookable windows as of `now`.
    #[instrument(
        skip(self, request),
        fields(user_id = %request.user_id, event_type_id = %request.event_type_id)
    )]
    pub fn resolve_at(
        &self,
        request: &AvailabilityRequest,
        now: DateTime<Utc>,
    ) -> Result<Availability> {
        let (range, tz_override) = self.validate(request)?;

        let prepared = match &self.cache {
            Some(cache) => {
                let key = CacheKey::from(request);
                match cache.get(&key) {
                    Some(hit) => {
                        debug!("cache hit");
                        hit
                    }
                    None => {
                        let seen = cache.generation(&request.user_id);
                        let prepared = self.prepare(request, range, tz_override)?;
                        cache.insert(key, prepared, seen)
                    }
                }
            }
            None => Arc::new(self.prepare(request, range, tz_override)?),
        };

        let windows = filter_bookable(
            &prepared.candidates,
            &prepared.conflicts,
            &prepared.event_type,
            now,
        );
        Ok(Availability { windows })
    }

    /// Effective windows of one date (admin preview of a host's schedule).
    pub fn effective_day_windows(
        &self,
        user_id: &str,
        event_type_id: Option<&str>,
        date: NaiveDate,
        timezone: Option<&str>,
    ) -> Result<Vec<DayWindow>> {
        get_effective_day_windows(&self.store, user_id, event_type_id, date, timezone)
    }

    /// Reject malformed requests before touching the store.
    fn validate(&self, request: &AvailabilityRequest) -> Result<(TimeRange, Option<Tz>)> {
        if request.user_id.trim().is_empty() {
            return Err(SlotError::Validation("user_id must not be empty".into()));
        }
        if request.event_type_id.trim().is_empty() {
            return Err(SlotError::Validation("event_type_id must not be empty".into()));
        }
        let range = TimeRange::new(request.range_start, request.range_end)?;
        let max = Duration::days(i64::from(self.config.max_range_days));
        if range.end - range.start > max {
            return Err(SlotError::Validation(format!(
                "range exceeds {} days",
                self.config.max_range_days
            )));
        }
        let tz_override = request
            .timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| SlotError::Validation(format!("unknown timezone '{name}'")))
            })
            .transpose()?;
        Ok((range, tz_override))
    }

    fn prepare(
        &self,
        request: &AvailabilityRequest,
        range: TimeRange,
        tz_override: Option<Tz>,
    ) -> Result<PreparedQuery> {
        let user_id = request.user_id.as_str();
        let host = self
            .store
            .get_host(user_id)
            .map_err(SlotError::store(format!("hosts for user {user_id}")))?
            .ok_or_else(|| SlotError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })?;

        let event_type = self
            .store
            .get_event_type(&request.event_type_id)
            .map_err(SlotError::store(format!(
                "event_types for id {}",
                request.event_type_id
            )))?
            .filter(|et| et.owner_user_id == user_id)
            .ok_or_else(|| SlotError::NotFound {
                entity: "event type",
                id: request.event_type_id.clone(),
            })?;

        if !event_type.is_active {
            debug!("event type inactive; nothing to generate");
            return Ok(PreparedQuery {
                event_type,
                candidates: Vec::new(),
                conflicts: ConflictIndex::default(),
            });
        }
        event_type.validate()?;

        let dates = DateRange {
            first: range.start.date_naive() - Duration::days(1),
            last: range.end.date_naive() + Duration::days(1),
        };
        let rule_book = RuleBook::load(
            &self.store,
            user_id,
            Some(&event_type.id),
            request.company_profile_id.as_deref(),
            Some(dates),
        )?;

        let candidates = match event_type.scheduling {
            SchedulingMode::Rules => generate_candidates(
                &rule_book,
                &event_type,
                range,
                tz_override,
                self.config.dst_policy,
            )?,
            SchedulingMode::FixedSlots => {
                let slots = self
                    .store
                    .list_time_slots(&event_type.id)
                    .map_err(SlotError::store(format!(
                        "event_type_time_slots for event type {}",
                        event_type.id
                    )))?;
                let default_tz = match &host.timezone {
                    Some(name) => parse_timezone(name, &host.id)?,
                    None => self.default_tz,
                };
                generate_session_candidates(
                    &rule_book,
                    &event_type,
                    &slots,
                    range,
                    tz_override,
                    default_tz,
                    self.config.dst_policy,
                )?
            }
        };

        // Candidates may end past the range; index bookings across their full extent.
        let conflicts = match candidates.iter().map(|c| c.end).max() {
            None => ConflictIndex::default(),
            Some(last_end) => {
                let span = TimeRange {
                    start: range.start,
                    end: range.end.max(last_end),
                };
                ConflictIndex::load(&self.store, user_id, span)?
            }
        };

        Ok(PreparedQuery {
            event_type,
            candidates,
            conflicts,
        })
    }
}

/// One-shot resolution against `store` with the default configuration.
pub fn resolve_availability<S: AvailabilityStore>(
    store: S,
    request: &AvailabilityRequest,
    now: DateTime<Utc>,
) -> Result<Availability> {
    Resolver::new(store).resolve_at(request, now)
}

//! Rule store access: the effective availability windows of one calendar date.
//!
//! For a date, the most specific matching override replaces the weekly rules
//! entirely: an unavailable override blocks the day, an available one supplies
//! the replacement window. Without an override, the event-type-specific rules
//! for that weekday are used if any exist, otherwise the user's global rules.
//! Windows sharing a timezone are merged into a minimal disjoint set.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use tracing::trace;

use crate::dst::parse_timezone;
use crate::error::{Result, SlotError};
use crate::interval::merge_intervals;
use crate::model::{AvailabilityOverride, AvailabilityRule};
use crate::store::{AvailabilityStore, DateRange};

/// Where a day window came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSource {
    Rule,
    Override,
}

/// A local wall-clock window `[start, end)` on one date, in `timezone`.
#[derive(Debug, Clone, PartialEq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
    pub source: WindowSource,
}

impl DayWindow {
    pub fn local_start(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn local_end(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }
}

/// What the overrides say about a date.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideDecision {
    Blocked,
    Replaced(Vec<DayWindow>),
}

/// Rules and overrides of one host, narrowed to an event type and company profile.
#[derive(Debug, Clone)]
pub struct RuleBook {
    event_type_id: Option<String>,
    company_profile_id: Option<String>,
    rules: Vec<(AvailabilityRule, Tz)>,
    overrides: Vec<(AvailabilityOverride, Tz)>,
}

impl RuleBook {
    /// Validate and scope the given records.
    ///
    /// Rules and overrides bound to another event type or another company
    /// profile are dropped. Malformed records fail with a configuration error
    /// naming the record.
    pub fn new(
        event_type_id: Option<&str>,
        company_profile_id: Option<&str>,
        rules: Vec<AvailabilityRule>,
        overrides: Vec<AvailabilityOverride>,
    ) -> Result<Self> {
        let in_scope = |et: &Option<String>, company: &Option<String>| {
            let et_ok = et.as_deref().is_none_or(|id| Some(id) == event_type_id);
            let company_ok = match (company.as_deref(), company_profile_id) {
                (Some(own), Some(wanted)) => own == wanted,
                _ => true,
            };
            et_ok && company_ok
        };

        let rules = rules
            .into_iter()
            .filter(|r| in_scope(&r.event_type_id, &r.company_profile_id))
            .map(|r| -> Result<(AvailabilityRule, Tz)> {
                r.validate()?;
                let tz = parse_timezone(&r.timezone, &r.id)?;
                Ok((r, tz))
            })
            .collect::<Result<Vec<_>>>()?;

        let overrides = overrides
            .into_iter()
            .filter(|o| in_scope(&o.event_type_id, &o.company_profile_id))
            .map(|o| -> Result<(AvailabilityOverride, Tz)> {
                o.validate()?;
                let tz = parse_timezone(&o.timezone, &o.id)?;
                Ok((o, tz))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            event_type_id: event_type_id.map(str::to_string),
            company_profile_id: company_profile_id.map(str::to_string),
            rules,
            overrides,
        })
    }

    /// Read the host's rules and the overrides within `dates` from `store`.
    pub fn load<S: AvailabilityStore + ?Sized>(
        store: &S,
        user_id: &str,
        event_type_id: Option<&str>,
        company_profile_id: Option<&str>,
        dates: Option<DateRange>,
    ) -> Result<Self> {
        let rules = store
            .list_availability_rules(user_id, event_type_id)
            .map_err(SlotError::store(format!("availability_rules for user {user_id}")))?;
        let overrides = store
            .list_availability_overrides(user_id, event_type_id, dates)
            .map_err(SlotError::store(format!(
                "availability_overrides for user {user_id}"
            )))?;
        Self::new(event_type_id, company_profile_id, rules, overrides)
    }

    /// The overrides of the most specific scope present on `date`.
    ///
    /// Scope specificity ranks event-type-specific above event-type-agnostic,
    /// then company-scoped above unscoped.
    fn winning_overrides(&self, date: NaiveDate) -> Vec<&(AvailabilityOverride, Tz)> {
        let rank = |o: &AvailabilityOverride| {
            let et = o.event_type_id.is_some() && o.event_type_id == self.event_type_id;
            let company =
                o.company_profile_id.is_some() && o.company_profile_id == self.company_profile_id;
            (et, company)
        };
        let on_date: Vec<&(AvailabilityOverride, Tz)> =
            self.overrides.iter().filter(|(o, _)| o.date == date).collect();
        let Some(best) = on_date.iter().map(|(o, _)| rank(o)).max() else {
            return Vec::new();
        };
        on_date.into_iter().filter(|(o, _)| rank(o) == best).collect()
    }

    /// The override decision for `date`, or `None` when weekly rules apply.
    pub fn override_for(
        &self,
        date: NaiveDate,
        tz_override: Option<Tz>,
    ) -> Result<Option<OverrideDecision>> {
        let winners = self.winning_overrides(date);
        if winners.is_empty() {
            return Ok(None);
        }
        if winners.iter().any(|(o, _)| o.is_unavailable) {
            trace!(%date, "date blocked by override");
            return Ok(Some(OverrideDecision::Blocked));
        }
        let mut windows = Vec::with_capacity(winners.len());
        for (o, tz) in winners {
            let (start, end) = o.replacement_window().ok_or_else(|| {
                SlotError::config(&o.id, "available override needs start_time before end_time")
            })?;
            windows.push((tz_override.unwrap_or(*tz), start, end));
        }
        Ok(Some(OverrideDecision::Replaced(merge_by_zone(
            date,
            windows,
            WindowSource::Override,
        ))))
    }

    pub fn is_blocked(&self, date: NaiveDate) -> Result<bool> {
        Ok(matches!(
            self.override_for(date, None)?,
            Some(OverrideDecision::Blocked)
        ))
    }

    /// Effective windows for `date`, sorted by start time.
    ///
    /// `tz_override`, when set, reinterprets every rule and override in that zone.
    pub fn effective_day_windows(
        &self,
        date: NaiveDate,
        tz_override: Option<Tz>,
    ) -> Result<Vec<DayWindow>> {
        match self.override_for(date, tz_override)? {
            Some(OverrideDecision::Blocked) => return Ok(Vec::new()),
            Some(OverrideDecision::Replaced(windows)) => return Ok(windows),
            None => {}
        }

        let weekday = date.weekday().num_days_from_sunday() as i16;
        let (specific, global): (Vec<_>, Vec<_>) = self
            .rules
            .iter()
            .filter(|(r, _)| r.day_of_week == weekday)
            .partition(|(r, _)| r.event_type_id.is_some());
        let chosen = if specific.is_empty() { global } else { specific };

        let windows = chosen
            .into_iter()
            .map(|(r, tz)| (tz_override.unwrap_or(*tz), r.start_time, r.end_time))
            .collect();
        Ok(merge_by_zone(date, windows, WindowSource::Rule))
    }
}

/// Merge windows per timezone and sort them by start time.
fn merge_by_zone(
    date: NaiveDate,
    windows: Vec<(Tz, NaiveTime, NaiveTime)>,
    source: WindowSource,
) -> Vec<DayWindow> {
    let mut zones: Vec<(Tz, Vec<(NaiveTime, NaiveTime)>)> = Vec::new();
    for (tz, start, end) in windows {
        match zones.iter_mut().find(|(z, _)| *z == tz) {
            Some((_, spans)) => spans.push((start, end)),
            None => zones.push((tz, vec![(start, end)])),
        }
    }

    let mut merged: Vec<DayWindow> = zones
        .into_iter()
        .flat_map(|(timezone, spans)| {
            merge_intervals(spans)
                .into_iter()
                .map(move |(start, end)| DayWindow {
                    date,
                    start,
                    end,
                    timezone,
                    source,
                })
        })
        .collect();
    merged.sort_by(|a, b| {
        (a.start, a.end, a.timezone.name()).cmp(&(b.start, b.end, b.timezone.name()))
    });
    merged
}

/// Effective windows of one date for a host, read straight from `store`.
///
/// An unknown user or event type yields no windows. `timezone`, when given,
/// must be a valid IANA name.
pub fn get_effective_day_windows<S: AvailabilityStore + ?Sized>(
    store: &S,
    user_id: &str,
    event_type_id: Option<&str>,
    date: NaiveDate,
    timezone: Option<&str>,
) -> Result<Vec<DayWindow>> {
    let tz_override = timezone
        .map(|name| {
            name.parse::<Tz>()
                .map_err(|_| SlotError::Validation(format!("unknown timezone '{name}'")))
        })
        .transpose()?;
    if let Some(id) = event_type_id {
        let owned = store
            .get_event_type(id)
            .map_err(SlotError::store(format!("event_types for id {id}")))?
            .is_some_and(|et| et.owner_user_id == user_id);
        if !owned {
            trace!(user_id, event_type_id = id, "unknown event type; no windows");
            return Ok(Vec::new());
        }
    }
    let dates = DateRange {
        first: date,
        last: date,
    };
    RuleBook::load(store, user_id, event_type_id, None, Some(dates))?
        .effective_day_windows(date, tz_override)
}

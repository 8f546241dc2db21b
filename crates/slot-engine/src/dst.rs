//! Timezone parsing and DST transition policies for local slot boundaries.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};

/// Longest DST gap we search across when shifting forward.
const MAX_GAP_MINUTES: i64 = 180;

/// Policy for slot boundaries that fall in a DST gap (e.g. 02:30 during spring forward).
///
/// Ambiguous local times (fall back) always resolve to the earlier instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Drop slots with a boundary in the gap.
    #[default]
    Skip,
    /// Move a slot starting in the gap to the first valid local time after it.
    /// The slot keeps its duration; one ending in a gap is still dropped.
    ShiftForward,
}

/// Parse an IANA zone stored on `entity_id`.
pub fn parse_timezone(name: &str, entity_id: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SlotError::config(entity_id, format!("invalid timezone '{name}'")))
}

/// Convert a local wall-clock time in `tz` to an absolute instant.
///
/// Returns `None` when the local time does not exist and the policy is [`DstPolicy::Skip`].
pub fn to_utc(tz: Tz, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
    resolve_local(tz, local, policy).map(|(_, instant)| instant)
}

/// The wall-clock time actually used for `local` under `policy`, and its instant.
///
/// Differs from `local` only when a gap time is shifted forward.
pub fn resolve_local(
    tz: Tz,
    local: NaiveDateTime,
    policy: DstPolicy,
) -> Option<(NaiveDateTime, DateTime<Utc>)> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some((local, dt.with_timezone(&Utc))),
        LocalResult::Ambiguous(earliest, _) => Some((local, earliest.with_timezone(&Utc))),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => (1..=MAX_GAP_MINUTES).find_map(|m| {
                let shifted = local + Duration::minutes(m);
                tz.from_local_datetime(&shifted)
                    .earliest()
                    .map(|dt| (shifted, dt.with_timezone(&Utc)))
            }),
        },
    }
}

/// A span of `length` wall-clock time starting at local `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSpan {
    /// Local start after applying the policy.
    pub local_start: NaiveDateTime,
    pub local_end: NaiveDateTime,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Convert a local span to instants, keeping its wall-clock length.
///
/// The policy applies to the start only; a shifted start moves the whole
/// span. A span whose end falls in a gap is dropped.
pub fn span_to_utc(
    tz: Tz,
    start: NaiveDateTime,
    length: Duration,
    policy: DstPolicy,
) -> Option<LocalSpan> {
    let (local_start, start) = resolve_local(tz, start, policy)?;
    let local_end = local_start + length;
    let (_, end) = resolve_local(tz, local_end, DstPolicy::Skip)?;
    (start < end).then_some(LocalSpan {
        local_start,
        local_end,
        start,
        end,
    })
}

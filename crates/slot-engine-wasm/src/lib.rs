//! WASM bindings for slot-engine.
//!
//! Exposes availability resolution, the effective-schedule preview and
//! snapshot checks to JavaScript via `wasm-bindgen`. Records travel as JSON
//! strings: a store snapshot in, an outcome envelope out. Resolution errors
//! are part of the envelope (`{"status":"error","error":{...}}`) rather than
//! thrown, so the booking page can tell "no times" from "not bookable" from
//! "try again later".
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p slot-engine-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir pkg/ \
//!   target/wasm32-unknown-unknown/release/slot_engine_wasm.wasm
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use slot_engine::rules::{DayWindow, WindowSource};
use slot_engine::{
    Availability, AvailabilityRequest, BookableWindow, InMemoryStore, Resolver, SlotError,
    StoreSnapshot,
};
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// Serde-friendly DTOs for crossing the WASM boundary as JSON
// ---------------------------------------------------------------------------

/// Request format passed from JavaScript.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestInput {
    user_id: String,
    event_type_id: String,
    range_start: String,
    range_end: String,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    company_profile_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WindowDto {
    start: String,
    end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_slot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spots_left: Option<u32>,
}

impl From<&BookableWindow> for WindowDto {
    fn from(w: &BookableWindow) -> Self {
        Self {
            start: w.start.to_rfc3339(),
            end: w.end.to_rfc3339(),
            time_slot_id: w.time_slot_id.clone(),
            spots_left: w.spots_left,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityDto {
    windows: Vec<WindowDto>,
    /// Set when the query succeeded but nothing is bookable.
    #[serde(skip_serializing_if = "Option::is_none")]
    empty_message: Option<&'static str>,
}

impl From<&Availability> for AvailabilityDto {
    fn from(a: &Availability) -> Self {
        Self {
            windows: a.windows.iter().map(WindowDto::from).collect(),
            empty_message: a.is_empty().then_some(Availability::EMPTY_MESSAGE),
        }
    }
}

#[derive(Serialize)]
struct DayWindowDto {
    date: String,
    start: String,
    end: String,
    timezone: &'static str,
    source: &'static str,
}

impl From<&DayWindow> for DayWindowDto {
    fn from(w: &DayWindow) -> Self {
        Self {
            date: w.date.to_string(),
            start: w.start.format("%H:%M").to_string(),
            end: w.end.format("%H:%M").to_string(),
            timezone: w.timezone.name(),
            source: match w.source {
                WindowSource::Rule => "rule",
                WindowSource::Override => "override",
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDto {
    kind: &'static str,
    message: String,
    user_message: &'static str,
    retryable: bool,
}

impl From<&SlotError> for ErrorDto {
    fn from(e: &SlotError) -> Self {
        let kind = match e {
            SlotError::NotFound { .. } => "not_found",
            SlotError::Configuration { .. } => "configuration",
            SlotError::StoreUnavailable { .. } => "store_unavailable",
            SlotError::Validation(_) => "validation",
        };
        Self {
            kind,
            message: e.to_string(),
            user_message: e.user_message(),
            retryable: e.is_retryable(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum Outcome<T> {
    Ok { data: T },
    Error { error: ErrorDto },
}

impl<T> From<Result<T, SlotError>> for Outcome<T> {
    fn from(result: Result<T, SlotError>) -> Self {
        match result {
            Ok(data) => Outcome::Ok { data },
            Err(e) => Outcome::Error {
                error: ErrorDto::from(&e),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an ISO 8601 datetime string into `DateTime<Utc>`.
///
/// Accepts RFC 3339 (with offset) and naive datetimes, which are read as UTC.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SlotError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| SlotError::Validation(format!("invalid datetime '{}': {}", s, e)))
}

fn load_snapshot(json: &str) -> Result<StoreSnapshot, SlotError> {
    StoreSnapshot::from_json(json).map_err(|e| SlotError::Configuration {
        entity_id: "snapshot".to_string(),
        reason: e.to_string(),
    })
}

fn load_store(json: &str) -> Result<InMemoryStore, SlotError> {
    InMemoryStore::from_snapshot(load_snapshot(json)?)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))
}

fn resolve(
    snapshot_json: &str,
    request_json: &str,
    now: Option<&str>,
) -> Result<AvailabilityDto, SlotError> {
    let input: RequestInput = serde_json::from_str(request_json)
        .map_err(|e| SlotError::Validation(format!("invalid request JSON: {}", e)))?;
    let request = AvailabilityRequest {
        user_id: input.user_id,
        event_type_id: input.event_type_id,
        range_start: parse_datetime(&input.range_start)?,
        range_end: parse_datetime(&input.range_end)?,
        timezone: input.timezone,
        company_profile_id: input.company_profile_id,
    };
    let now = match now {
        Some(s) => parse_datetime(s)?,
        None => Utc::now(),
    };

    let resolver = Resolver::new(load_store(snapshot_json)?);
    let availability = resolver.resolve_at(&request, now)?;
    Ok(AvailabilityDto::from(&availability))
}

fn resolve_json(snapshot_json: &str, request_json: &str, now: Option<&str>) -> Result<String, String> {
    to_json(&Outcome::from(resolve(snapshot_json, request_json, now)))
}

fn day_windows(
    snapshot_json: &str,
    user_id: &str,
    event_type_id: Option<&str>,
    date: &str,
    timezone: Option<&str>,
) -> Result<Vec<DayWindowDto>, SlotError> {
    let date: NaiveDate = date
        .parse()
        .map_err(|e| SlotError::Validation(format!("invalid date '{}': {}", date, e)))?;
    let resolver = Resolver::new(load_store(snapshot_json)?);
    let windows = resolver.effective_day_windows(user_id, event_type_id, date, timezone)?;
    Ok(windows.iter().map(DayWindowDto::from).collect())
}

fn day_windows_json(
    snapshot_json: &str,
    user_id: &str,
    event_type_id: Option<&str>,
    date: &str,
    timezone: Option<&str>,
) -> Result<String, String> {
    to_json(&Outcome::from(day_windows(
        snapshot_json,
        user_id,
        event_type_id,
        date,
        timezone,
    )))
}

fn check_json(snapshot_json: &str) -> Result<String, String> {
    let problems = load_snapshot(snapshot_json).map(|s| {
        s.lint()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<String>>()
    });
    to_json(&Outcome::from(problems))
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Resolve the bookable windows of one event type.
///
/// # Arguments
/// - `snapshot_json` -- store snapshot (`hosts`, `event_types`, `availability_rules`, ...)
/// - `request_json` -- `{userId, eventTypeId, rangeStart, rangeEnd, timezone?, companyProfileId?}`
/// - `now` -- optional ISO 8601 instant to evaluate notice and booking window at
///
/// Returns `{"status":"ok","data":{"windows":[...]}}` or
/// `{"status":"error","error":{kind, message, userMessage, retryable}}`.
#[wasm_bindgen(js_name = "resolveAvailability")]
pub fn resolve_availability(
    snapshot_json: &str,
    request_json: &str,
    now: Option<String>,
) -> Result<String, JsValue> {
    resolve_json(snapshot_json, request_json, now.as_deref()).map_err(|e| JsValue::from_str(&e))
}

/// Effective availability windows of one date, for schedule previews.
///
/// `date` is `YYYY-MM-DD`. Windows are returned as local `HH:MM` times with
/// their IANA zone and whether they come from a rule or an override.
#[wasm_bindgen(js_name = "effectiveDayWindows")]
pub fn effective_day_windows(
    snapshot_json: &str,
    user_id: &str,
    event_type_id: Option<String>,
    date: &str,
    timezone: Option<String>,
) -> Result<String, JsValue> {
    day_windows_json(
        snapshot_json,
        user_id,
        event_type_id.as_deref(),
        date,
        timezone.as_deref(),
    )
    .map_err(|e| JsValue::from_str(&e))
}

/// List dangling references and malformed records of a snapshot.
#[wasm_bindgen(js_name = "checkSnapshot")]
pub fn check_snapshot(snapshot_json: &str) -> Result<String, JsValue> {
    check_json(snapshot_json).map_err(|e| JsValue::from_str(&e))
}

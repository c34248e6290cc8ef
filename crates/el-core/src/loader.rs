//! Building snapshots and events from raw JSON log entries.
//!
//! Entries come from files written by the game logger. Individual entries can
//! be malformed; the batch loader skips those with a warning and keeps going.

use chrono::{DateTime, NaiveDateTime};
use tracing::warn;

use crate::error::{LoadError, ValueError};
use crate::snapshot::{Event, SessionData, Snapshot};
use crate::value::{Object, Value, ValueKind};

/// Timestamp layout used in snapshot file names (`snapshot_20250304_021500`).
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Parse a timestamp given as a number, a numeric string, a file stamp, or RFC 3339.
pub fn parse_timestamp(raw: &serde_json::Value) -> Result<f64, LoadError> {
    match raw {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| LoadError::InvalidTimestamp(n.to_string())),
        serde_json::Value::String(s) => parse_timestamp_str(s),
        other => Err(LoadError::InvalidTimestamp(other.to_string())),
    }
}

fn parse_timestamp_str(text: &str) -> Result<f64, LoadError> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<f64>() {
        if secs.is_finite() {
            return Ok(secs);
        }
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, STAMP_FORMAT) {
        return Ok(naive.and_utc().timestamp_millis() as f64 / 1000.0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_millis() as f64 / 1000.0);
    }
    Err(LoadError::InvalidTimestamp(text.to_string()))
}

fn entry_timestamp(obj: &serde_json::Map<String, serde_json::Value>) -> Result<f64, LoadError> {
    let raw = obj
        .get("timestamp")
        .or_else(|| obj.get("_timestamp"))
        .ok_or(LoadError::MissingTimestamp)?;
    parse_timestamp(raw)
}

/// Parse one snapshot entry.
///
/// The state is the `snapshot_data` object when present, otherwise the entry
/// itself. The `timestamp` key and `_`-prefixed metadata keys are dropped from
/// the top level so they never show up as state changes.
pub fn parse_snapshot(raw: &serde_json::Value) -> Result<Snapshot, LoadError> {
    let obj = Value::from(raw.clone()).into_object()?;
    let timestamp = match raw {
        serde_json::Value::Object(map) => entry_timestamp(map)?,
        _ => return Err(LoadError::MissingTimestamp),
    };

    let mut state: Object = match obj.get("snapshot_data") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => obj,
    };
    state.retain(|key, _| key != "timestamp" && !key.starts_with('_'));

    Ok(Snapshot::from_object(timestamp, state))
}

/// Parse one event entry (`type` or `event_type`, `timestamp`, optional `data`).
pub fn parse_event(raw: &serde_json::Value) -> Result<Event, LoadError> {
    let serde_json::Value::Object(map) = raw else {
        return Err(ValueError::TypeMismatch {
            expected: ValueKind::Object,
            found: Value::from(raw.clone()).kind(),
        }
        .into());
    };
    let kind = map
        .get("type")
        .or_else(|| map.get("event_type"))
        .and_then(serde_json::Value::as_str)
        .ok_or(LoadError::MissingEventType)?;
    let timestamp = entry_timestamp(map)?;
    let data = match map.get("data") {
        Some(d) => Value::from(d.clone()),
        None => Value::Object(Object::new()),
    };
    Ok(Event::new(kind, timestamp, data)?)
}

impl SessionData {
    /// Build a session from raw entries, skipping the ones that cannot be parsed.
    pub fn from_json_entries(
        snapshots: &[serde_json::Value],
        events: &[serde_json::Value],
    ) -> Self {
        let snapshots = snapshots
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| match parse_snapshot(raw) {
                Ok(snap) => Some(snap),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed snapshot entry");
                    None
                }
            })
            .collect();
        let events = events
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| match parse_event(raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed event entry");
                    None
                }
            })
            .collect();
        SessionData::new(snapshots, events)
    }
}

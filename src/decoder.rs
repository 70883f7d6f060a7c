// src/decoder.rs - one raw line to one Entry
use chrono::{DateTime, NaiveTime, Utc};
use serde_json::{Map, Value};

use crate::entry::{Entry, PodMetadata};
use crate::error::DecodeFailure;
use crate::message::parse_message;

pub const TIME_KEY: &str = "time";
pub const STREAM_KEY: &str = "stream";
pub const MESSAGE_KEY: &str = "log";
pub const METADATA_KEY: &str = "kubernetes";

/// Decode one non-blank line into an Entry.
///
/// Only a line that is not a JSON object, or carries neither a `log` string
/// nor a `kubernetes` object, fails. Anything else missing or malformed just
/// leaves the matching Entry field empty.
pub fn decode_line(line: &str) -> Result<Entry, DecodeFailure> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| DecodeFailure::InvalidJson(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(DecodeFailure::NotAnObject);
    };
    decode_object(&obj)
}

fn decode_object(obj: &Map<String, Value>) -> Result<Entry, DecodeFailure> {
    let raw_message = obj.get(MESSAGE_KEY).and_then(Value::as_str);
    let metadata = obj.get(METADATA_KEY).and_then(Value::as_object);

    if raw_message.is_none() && metadata.is_none() {
        return Err(DecodeFailure::NoContent);
    }

    let raw_message = raw_message.unwrap_or_default().to_string();
    let parsed = parse_message(&raw_message);

    Ok(Entry::new(
        obj.get(TIME_KEY).and_then(timestamp_from_value),
        string_field(obj, STREAM_KEY),
        raw_message,
        metadata.map(pod_metadata).unwrap_or_default(),
        parsed,
    ))
}

fn pod_metadata(obj: &Map<String, Value>) -> PodMetadata {
    PodMetadata {
        pod_name: string_field(obj, "pod_name"),
        namespace: string_field(obj, "namespace_name"),
        container_name: string_field(obj, "container_name"),
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                DateTime::from_timestamp(secs, 0)
            } else {
                let secs = n.as_f64()?;
                if !secs.is_finite() {
                    return None;
                }
                // Nanos count forward from the floor, also for negative epochs
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9) as u32;
                DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
            }
        }
        _ => None,
    }
}

/// Parse an instant, normalized to UTC. Zone-less inputs are taken as UTC
/// and a missing time of day is midnight.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // RFC3339 covers the container runtime's own format
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    dateparser::parse_with(text, &Utc, NaiveTime::MIN).ok()
}

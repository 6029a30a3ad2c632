//! Timestamp normalisation for stored records.
//!
//! The store holds `recordedAt` values in several shapes depending on which
//! client wrote them: RFC 3339 strings, epoch milliseconds, or
//! `{ "seconds", "nanoseconds" }` objects. Everything funnels through here.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Parse a stored timestamp into an instant, if it has a recognised shape.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos.min(999_999_999) as u32)
                .single()
        }
        _ => None,
    }
}

/// Comparable instant for ordering records; absent or unparseable values are
/// the earliest representable instant.
pub fn to_comparable_instant(value: Option<&Value>) -> DateTime<Utc> {
    comparable(value.and_then(parse_instant))
}

/// Ordering key for an already-decoded instant; `None` sorts first.
pub fn comparable(instant: Option<DateTime<Utc>>) -> DateTime<Utc> {
    instant.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

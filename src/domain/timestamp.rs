//! Serde helpers for API timestamps.
//!
//! The backend serializes conversation timestamps as Unix seconds (sometimes
//! fractional) while messages and locally stamped records use RFC 3339. Both
//! decode to `DateTime<Utc>`.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(f64),
    Text(String),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawTimestamp::deserialize(deserializer)?;
    parse(raw).map_err(de::Error::custom)
}

pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawTimestamp::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(raw) => parse(raw).map(Some).map_err(de::Error::custom),
    }
}

fn parse(raw: RawTimestamp) -> Result<DateTime<Utc>, String> {
    match raw {
        RawTimestamp::Seconds(seconds) => from_unix_seconds(seconds),
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|error| format!("invalid RFC 3339 timestamp {text:?}: {error}")),
    }
}

fn from_unix_seconds(seconds: f64) -> Result<DateTime<Utc>, String> {
    if !seconds.is_finite() {
        return Err(format!("invalid unix timestamp {seconds}"));
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;

    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .ok_or_else(|| format!("unix timestamp out of range: {seconds}"))
}

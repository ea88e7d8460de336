//! Deserializers that accept older on-disk shapes.
//!
//! Earlier versions of the state files store naive local timestamps
//! (`2024-05-01T08:00:00.123456`) and may hold lists or numbers where a
//! string is expected now.

use super::value_to_text;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Parse an RFC 3339 timestamp, or a naive one read as local time
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc));
    // Wall-clock times inside a DST gap have no local instant
    Some(local.unwrap_or_else(|| Utc.from_utc_datetime(&naive)))
}

pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

/// Optional timestamp; null or unparsable values read as absent
pub fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(raw)) => parse_timestamp(&raw),
        _ => None,
    })
}

/// Any JSON value flattened to text; null and blank read as absent
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_to_text))
}

/// String map whose values may be any JSON; entries that flatten to
/// nothing are dropped
pub fn text_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value_to_text(&value).map(|text| (key, text)))
        .collect())
}

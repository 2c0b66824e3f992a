//! Lenient field decoding for backend rows.
//!
//! Backend rows are loosely typed: ids may be blank, amounts may arrive as
//! numeric strings, booleans as `"true"`. Every coercion happens here so the
//! rest of the crate only sees `Option`s of real types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(non_empty_str).map(ToOwned::to_owned))
}

pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_value))
}

pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<RowDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(non_empty_str).map(RowDate::new))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|text| !text.is_empty())
}

fn number_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// A date or timestamp column: the trimmed text as sent by the backend plus
/// the UTC instant it denotes, when it parses.
///
/// The raw text is what month windows match against (`"2026-10"` prefix), so
/// an offset timestamp late on the last day of a month still counts for that
/// month.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDate {
    raw: String,
    instant: Option<DateTime<Utc>>,
}

impl RowDate {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let instant = parse_instant(&raw);
        Self { raw, instant }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.instant
    }

    pub fn in_month(&self, month_prefix: &str) -> bool {
        !month_prefix.is_empty() && self.raw.starts_with(month_prefix)
    }
}

impl Serialize for RowDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// `YYYY-MM-DD` is UTC midnight; RFC 3339 keeps its offset; naive timestamps are read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.with_timezone(&Utc));
    }
    // Postgres style `2026-10-19 08:00:00+00`, or a colon-less `+0000` offset
    if let Some(value) = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%z"]
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
    {
        return Some(value.with_timezone(&Utc));
    }
    [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    .map(|naive| naive.and_utc())
}

/// Sort key placing undated rows after every dated one.
pub fn undated_last(date: Option<&RowDate>) -> (bool, Option<DateTime<Utc>>) {
    let instant = date.and_then(RowDate::instant);
    (instant.is_none(), instant)
}

/// First present value among `candidates`, mirroring the backend's fallback columns.
pub fn first_present<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates.into_iter().flatten().next()
}

/// Trimmed, lower-cased status used for every set-membership check.
pub fn normalized(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_ascii_lowercase()
}

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::Serialize;

use crate::records::fields::parse_instant;

const MONTHS_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTHS_ES: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "es-PY")]
    EsPy,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "es" | "es-py" => Some(Self::EsPy),
            "en" | "en-us" => Some(Self::EnUs),
            _ => None,
        }
    }

    /// First `Accept-Language` entry whose primary subtag is `en` or `es`.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        header
            .split(',')
            .filter_map(|entry| entry.split(';').next())
            .map(str::trim)
            .find_map(|tag| {
                let primary = tag.split('-').next().unwrap_or_default();
                match primary.to_ascii_lowercase().as_str() {
                    "en" => Some(Self::EnUs),
                    "es" => Some(Self::EsPy),
                    _ => None,
                }
            })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EsPy => "es-PY",
            Self::EnUs => "en-US",
        }
    }

    pub fn is_en(self) -> bool {
        self == Self::EnUs
    }

    pub fn text(self, en: &'static str, es: &'static str) -> &'static str {
        if self.is_en() {
            en
        } else {
            es
        }
    }

    /// Medium date label for ISO dates, with the time appended for ISO timestamps.
    /// Anything else yields `None`.
    pub fn date_label(self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if is_iso_date(raw) {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
            return Some(self.medium_date(date));
        }
        if !is_iso_date_time(raw) {
            return None;
        }
        let instant = parse_instant(raw)?;
        let date = self.medium_date(instant.date_naive());
        let (hour, minute) = (instant.hour(), instant.minute());
        Some(match self {
            Self::EnUs => {
                let meridiem = if hour < 12 { "AM" } else { "PM" };
                let hour12 = match hour % 12 {
                    0 => 12,
                    other => other,
                };
                format!("{date}, {hour12}:{minute:02} {meridiem}")
            }
            Self::EsPy => format!("{date}, {hour:02}:{minute:02}"),
        })
    }

    pub fn month_label(self, now: DateTime<Utc>) -> String {
        let month = now.month0() as usize;
        match self {
            Self::EnUs => format!("{} {}", MONTHS_EN[month], now.year()),
            Self::EsPy => format!("{} {}", MONTHS_ES[month], now.year()),
        }
    }

    /// PYG has no minor unit, so amounts are rounded to whole guaraníes.
    pub fn format_pyg(self, amount: f64) -> String {
        let rounded = if amount.is_finite() { amount.round() } else { 0.0 };
        let sign = if rounded < 0.0 { "-" } else { "" };
        let digits = format!("{:.0}", rounded.abs());
        match self {
            Self::EnUs => format!("{sign}PYG {}", group_thousands(&digits, ',')),
            Self::EsPy => format!("{sign}Gs. {}", group_thousands(&digits, '.')),
        }
    }

    fn medium_date(self, date: NaiveDate) -> String {
        let month = date.month0() as usize;
        match self {
            Self::EnUs => format!("{} {}, {}", MONTHS_EN[month], date.day(), date.year()),
            Self::EsPy => format!("{} {} {}", date.day(), MONTHS_ES[month], date.year()),
        }
    }
}

fn is_iso_date(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// `YYYY-MM-DDTHH:MM` prefix; seconds, fraction and offset are optional.
fn is_iso_date_time(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 16
        && raw.get(..10).is_some_and(is_iso_date)
        && bytes[10] == b'T'
        && bytes[11..16].iter().enumerate().all(|(index, byte)| match index {
            2 => *byte == b':',
            _ => byte.is_ascii_digit(),
        })
}

fn group_thousands(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }
    grouped
}

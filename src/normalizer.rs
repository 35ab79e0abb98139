use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{RawListing, WorkArrangement};

pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_COUNTRY: &str = "Unknown country";
pub const DEFAULT_CURRENCY: &str = "IDR";

static RELATIVE_AGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*([dhm])").expect("valid relative age pattern"));
static ISO_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid ISO day pattern"));

/// Ordered synonym table; earlier rows win when free text mentions several.
const ARRANGEMENT_SYNONYMS: &[(&str, WorkArrangement)] = &[
    ("remote", WorkArrangement::Remote),
    ("work from home", WorkArrangement::Remote),
    ("work-from-home", WorkArrangement::Remote),
    ("wfh", WorkArrangement::Remote),
    ("hybrid", WorkArrangement::Hybrid),
    ("on-site", WorkArrangement::Onsite),
    ("onsite", WorkArrangement::Onsite),
    ("di tempat", WorkArrangement::Onsite),
];

// ---- raw value access ----

pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn first_text(raw: &RawListing, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(raw.get(*key)))
}

pub fn object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object).filter(|m| !m.is_empty())
}

pub fn at_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Positive whole amount from a number or a numeric string ("5,000,000").
/// Zero counts as absent.
pub fn amount(value: Option<&Value>) -> Option<u64> {
    let amount = match value? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
        }),
        Value::String(s) => {
            let s = s.trim();
            // A trailing ".5" / ".50" is a fraction; any other dot groups thousands.
            let whole = match s.rsplit_once('.') {
                Some((head, tail))
                    if tail.len() <= 2 && tail.chars().all(|c| c.is_ascii_digit()) =>
                {
                    head
                }
                _ => s,
            };
            let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }?;
    (amount > 0).then_some(amount)
}

// ---- identifier ----

pub fn prefixed_id(prefix: &str, native: Option<&Value>) -> Option<String> {
    text(native).map(|id| format!("{}_{}", prefix, id))
}

// ---- location ----

/// Formatted primary label plus up to two ancestor regions, then the
/// country name, then `fallback`.
pub fn hierarchical_location(
    location: Option<&Value>,
    country: Option<&Value>,
    fallback: &str,
) -> String {
    if let Some(label) = location.and_then(|v| text(Some(v))) {
        return label;
    }

    let mut parts = Vec::new();
    if let Some(loc) = object(location) {
        if let Some(name) = text(loc.get("formattedName")) {
            parts.push(name);
        }
        if let Some(parents) = loc.get("parents").and_then(Value::as_array) {
            parts.extend(
                parents
                    .iter()
                    .take(2)
                    .filter_map(|p| text(p.get("formattedName"))),
            );
        }
    }
    if !parts.is_empty() {
        return parts.join(", ");
    }

    object(country)
        .and_then(|c| text(c.get("name")))
        .or_else(|| text(country))
        .unwrap_or_else(|| fallback.to_string())
}

/// Label-style location: `jobLocation` (object or string), then `location`,
/// then suburb/area, then `fallback`.
pub fn labelled_location(raw: &RawListing, fallback: &str) -> String {
    let from_job_location = match raw.get("jobLocation") {
        Some(Value::Object(loc)) => {
            text(loc.get("label")).or_else(|| text(loc.get("countryCode")))
        }
        other => text(other),
    };
    if let Some(location) = from_job_location {
        return location;
    }

    let from_location = match raw.get("location") {
        Some(Value::Object(loc)) => text(loc.get("label")).or_else(|| text(loc.get("name"))),
        other => text(other),
    };
    if let Some(location) = from_location {
        return location;
    }

    let parts: Vec<String> = ["suburb", "area"]
        .iter()
        .filter_map(|key| text(raw.get(*key)))
        .collect();
    if !parts.is_empty() {
        return parts.join(", ");
    }

    fallback.to_string()
}

// ---- salary ----

pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_salary(min: Option<u64>, max: Option<u64>, currency: Option<&str>) -> Option<String> {
    let currency = currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY);
    match (min, max) {
        (Some(min), Some(max)) => Some(format!(
            "{} {} - {}",
            currency,
            group_thousands(min),
            group_thousands(max)
        )),
        (Some(min), None) => Some(format!("{} {}+", currency, group_thousands(min))),
        (None, Some(max)) => Some(format!("{} up to {}", currency, group_thousands(max))),
        (None, None) => None,
    }
}

/// Pre-formatted label when the source has one, else composed from a
/// `{min|minimum, max|maximum, currency}` object.
pub fn salary_from_value(salary: Option<&Value>, label: Option<&Value>) -> Option<String> {
    match salary {
        Some(Value::String(_)) => text(salary).or_else(|| text(label)),
        Some(Value::Object(fields)) => text(fields.get("label")).or_else(|| {
            format_salary(
                ["min", "minimum"].iter().find_map(|k| amount(fields.get(*k))),
                ["max", "maximum"].iter().find_map(|k| amount(fields.get(*k))),
                fields.get("currency").and_then(Value::as_str),
            )
        }),
        _ => text(label),
    }
}

// ---- dates ----

/// Date part of an absolute ISO-8601 timestamp or `YYYY-MM-DD` prefix.
pub fn absolute_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.date_naive());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt.date());
        }
    }
    if ISO_DAY.is_match(raw) {
        return NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d").ok();
    }
    None
}

pub fn relative_date(raw: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    let lower = raw.to_lowercase();
    if let Some(caps) = RELATIVE_AGE.captures(&lower) {
        let value: i64 = caps[1].parse().ok()?;
        let ago = match &caps[2] {
            "d" => Duration::try_days(value)?,
            "h" => Duration::try_hours(value)?,
            "m" => Duration::try_minutes(value)?,
            _ => return None,
        };
        return now.checked_sub_signed(ago).map(|dt| dt.date());
    }
    if lower.contains("just") || lower.contains("baru") {
        return Some(now.date());
    }
    None
}

pub fn normalize_date(raw: Option<&Value>, now: NaiveDateTime) -> Option<String> {
    let raw = text(raw)?;
    absolute_date(&raw)
        .or_else(|| relative_date(&raw, now))
        .map(|d| d.format("%Y-%m-%d").to_string())
}

// ---- work arrangement ----

pub fn arrangement_from_code(code: Option<&Value>) -> Option<WorkArrangement> {
    let code = text(code)?.to_uppercase().replace(['-', '_', ' '], "");
    match code.as_str() {
        "REMOTE" => Some(WorkArrangement::Remote),
        "HYBRID" => Some(WorkArrangement::Hybrid),
        "ONSITE" => Some(WorkArrangement::Onsite),
        _ => None,
    }
}

pub fn match_arrangement(text: &str) -> Option<WorkArrangement> {
    let lower = text.to_lowercase();
    ARRANGEMENT_SYNONYMS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, arrangement)| *arrangement)
}

pub fn detect_arrangement<'a>(
    explicit: Option<&Value>,
    labels: impl IntoIterator<Item = &'a str>,
    free_text: Option<&str>,
) -> Option<WorkArrangement> {
    arrangement_from_code(explicit)
        .or_else(|| labels.into_iter().find_map(match_arrangement))
        .or_else(|| free_text.and_then(match_arrangement))
}

//! Row normalizer: loosely-typed spreadsheet rows in, typed rows out.
//!
//! Pure per-row functions. Rows without a shipment identifier are dropped
//! (header/footer noise is routine in exported sheets); every other defect
//! degrades to a fallback value instead of failing.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::config::ColumnAliases;
use crate::model::{header_key, NormalizedRow, RawRow, RawValue};

/// Placeholder for descriptive fields the row does not carry.
pub const FALLBACK_TEXT: &str = "N/A";

/// Normalize one row. Returns `None` when the shipment identifier is missing.
pub fn normalize_row(row: &RawRow, aliases: &ColumnAliases) -> Option<NormalizedRow> {
    let shipment_id = lookup(row, &aliases.shipment_id).and_then(identifier)?;

    Some(NormalizedRow {
        shipment_id,
        origin_branch: text_or_fallback(row, &aliases.origin_branch),
        destination_branch: text_or_fallback(row, &aliases.destination_branch),
        leg_type_raw: lookup(row, &aliases.leg_type).map(display_text).unwrap_or_default(),
        cargo_label: text_or_fallback(row, &aliases.cargo_label),
        vehicle: text_or_fallback(row, &aliases.vehicle),
        driver: text_or_fallback(row, &aliases.driver),
        invoice_id: lookup(row, &aliases.invoice_id).and_then(identifier),
        volume: lookup(row, &aliases.volume).map(parse_locale_number).unwrap_or(0.0),
        weight: lookup(row, &aliases.weight).map(parse_locale_number).unwrap_or(0.0),
        created_at: lookup(row, &aliases.created_at).and_then(parse_date),
        completion_date: lookup(row, &aliases.completion_date).and_then(parse_date),
        completion_operator: lookup(row, &aliases.completion_operator)
            .map(display_text)
            .filter(|s| !s.is_empty()),
        line_status: lookup(row, &aliases.line_status)
            .map(display_text)
            .unwrap_or_default()
            .to_uppercase(),
    })
}

/// Normalize a whole sheet, dropping rows without a shipment identifier.
pub fn normalize_rows(rows: &[RawRow], aliases: &ColumnAliases) -> Vec<NormalizedRow> {
    let normalized: Vec<NormalizedRow> =
        rows.iter().filter_map(|r| normalize_row(r, aliases)).collect();
    let dropped = rows.len() - normalized.len();
    if dropped > 0 {
        log::debug!("normalizer dropped {dropped} row(s) without a shipment id");
    }
    normalized
}

/// A file is manifest-style when its headers carry both a shipment-id alias
/// and an origin-branch alias. Anything else is a legacy conference sheet.
pub fn is_manifest_file(rows: &[RawRow], aliases: &ColumnAliases) -> bool {
    let has_any = |list: &[String]| {
        let wanted: Vec<String> = list.iter().map(|a| header_key(a)).collect();
        rows.iter()
            .any(|r| r.headers().any(|h| wanted.iter().any(|w| w == h)))
    };
    has_any(&aliases.shipment_id) && has_any(&aliases.origin_branch)
}

/// First alias with a non-empty cell.
fn lookup<'a>(row: &'a RawRow, aliases: &[String]) -> Option<&'a RawValue> {
    aliases
        .iter()
        .filter_map(|a| row.get(a))
        .find(|v| !v.is_empty())
}

fn text_or_fallback(row: &RawRow, aliases: &[String]) -> String {
    lookup(row, aliases)
        .map(display_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_TEXT.to_string())
}

fn display_text(value: &RawValue) -> String {
    match value {
        RawValue::Empty => String::new(),
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Number(n) => format_number(*n),
        RawValue::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        RawValue::Date(dt) => dt.date().format("%Y-%m-%d").to_string(),
    }
}

/// Identifier cells: integral numbers lose the `.0`, blanks become `None`.
fn identifier(value: &RawValue) -> Option<String> {
    let s = display_text(value);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Parse a pt-BR formatted number: `.` groups thousands, `,` is the decimal
/// separator. Numeric cells pass through. Anything unparsable is `0`.
pub fn parse_locale_number(value: &RawValue) -> f64 {
    match value {
        RawValue::Number(n) if n.is_finite() => *n,
        RawValue::Text(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '.')
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const GENERIC_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const GENERIC_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

fn day_first_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})[/\-](\d{1,2})[/\-](\d{4}|\d{2})").unwrap())
}

/// Parse a date cell. Every parsed date lands on 12:00 UTC of its day.
///
/// Numbers are spreadsheet serials (1899-12-30 epoch). Strings try
/// day/month/year first, then ISO-like layouts. Invalid or empty input is
/// `None`; this never defaults to the current time.
pub fn parse_date(value: &RawValue) -> Option<DateTime<Utc>> {
    match value {
        RawValue::Number(serial) => from_serial(*serial),
        RawValue::Date(dt) => at_noon(dt.date()),
        RawValue::Text(s) => parse_date_text(s.trim()),
        RawValue::Empty | RawValue::Bool(_) => None,
    }
}

fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = day_first_pattern().captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }
        return NaiveDate::from_ymd_opt(year, month, day).and_then(at_noon);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return at_noon(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in GENERIC_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return at_noon(dt.date());
        }
    }
    for fmt in GENERIC_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return at_noon(d);
        }
    }
    None
}

/// Serial of 9999-12-31. Larger numbers are not spreadsheet dates
/// (epoch timestamps, invoice numbers typed into a date column).
const MAX_SERIAL: f64 = 2_958_465.0;

fn from_serial(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial <= 0.0 || serial > MAX_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    let dt = epoch.checked_add_signed(Duration::try_seconds(seconds)?)?;
    at_noon(dt.date())
}

fn at_noon(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(12, 0, 0).map(|dt| dt.and_utc())
}

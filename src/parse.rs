use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parse a Brazilian currency cell (`R$ 1.234,56`) into a number.
///
/// Dots are thousands separators and the comma is the decimal separator.
/// One leading sign is accepted. Blank cells, stray text, exponent forms
/// (`1e3`) and anything with more than one decimal comma yield `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let without_symbol = raw.replace("R$", "");
    let trimmed = without_symbol.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace('.', "").replace(',', ".");
    let unsigned = normalized
        .strip_prefix('-')
        .or_else(|| normalized.strip_prefix('+'))
        .unwrap_or(&normalized);
    if unsigned.matches('.').count() > 1
        || !unsigned.chars().any(|c| c.is_ascii_digit())
        || !unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

fn day_first_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})(?:[ T]+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$")
            .expect("day-first date pattern is valid")
    })
}

fn iso_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[ T]+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$")
            .expect("iso date pattern is valid")
    })
}

/// Two-digit years follow the POSIX `%y` pivot: 00-68 is 20xx, 69-99 is 19xx.
fn expand_year(raw: &str) -> Option<i32> {
    let y: i32 = raw.parse().ok()?;
    if raw.len() == 2 {
        Some(if y < 69 { 2000 + y } else { 1900 + y })
    } else {
        Some(y)
    }
}

fn time_from(caps: &Captures, first: usize) -> Option<NaiveTime> {
    let Some(hour) = caps.get(first) else {
        return NaiveTime::from_hms_opt(0, 0, 0);
    };
    let h: u32 = hour.as_str().parse().ok()?;
    let m: u32 = caps.get(first + 1)?.as_str().parse().ok()?;
    let s: u32 = match caps.get(first + 2) {
        Some(sec) => sec.as_str().parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(h, m, s)
}

/// Parse a day-first timestamp: `DD/MM/YYYY`, `DD/MM/YY`, optionally with
/// `HH:MM[:SS]`. Unambiguous ISO `YYYY-MM-DD` is accepted too.
///
/// `05/03/2024` is the 5th of March, never May 3rd.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Some(caps) = day_first_pattern().captures(raw) {
        let d: u32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        let y = expand_year(&caps[3])?;
        let date = NaiveDate::from_ymd_opt(y, m, d)?;
        return Some(date.and_time(time_from(&caps, 4)?));
    }
    if let Some(caps) = iso_pattern().captures(raw) {
        let y: i32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        let d: u32 = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(y, m, d)?;
        return Some(date.and_time(time_from(&caps, 4)?));
    }
    None
}

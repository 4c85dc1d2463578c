//! Temporal resolver - relative date expressions to absolute dates.
//!
//! Resolution is always anchored to the record's publication time, never to
//! wall-clock "now", so re-extraction of old records replays to the same
//! dates.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use regex::Regex;

/// Outcome of resolving a date expression.
///
/// `Unresolved` is informational, not an error: callers treat it as "no due
/// date", never as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Date(NaiveDate),
    Unresolved,
}

impl Resolution {
    /// The resolved date, if any.
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(d),
            Self::Unresolved => None,
        }
    }
}

/// Resolve a date expression against an anchor timestamp.
///
/// Absolute dates win over relative phrases; anything uninterpretable is
/// `Unresolved`.
pub fn resolve(expression: &str, anchor: DateTime<Utc>) -> Resolution {
    if expression.trim().is_empty() {
        return Resolution::Unresolved;
    }
    if let Some(date) = parse_absolute(expression, anchor) {
        return Resolution::Date(date);
    }
    if let Some(date) = parse_relative(expression, anchor) {
        return Resolution::Date(date);
    }
    Resolution::Unresolved
}

// --- absolute dates ---

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})").unwrap());
static MONTH_DAY_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[-/](\d{1,2})\b").unwrap());
static MONTH_DAY_KOREAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})월\s*(\d{1,2})일").unwrap());
static MONTH_DAY_ENGLISH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})\b")
        .unwrap()
});

fn parse_absolute(text: &str, anchor: DateTime<Utc>) -> Option<NaiveDate> {
    if let Some(caps) = FULL_DATE.captures(text) {
        let (y, m, d) = (num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?);
        if let Some(date) = NaiveDate::from_ymd_opt(y as i32, m, d) {
            return Some(date);
        }
    }
    for (pattern, month_from) in [
        (&MONTH_DAY_KOREAN, MonthCapture::Numeric),
        (&MONTH_DAY_ENGLISH, MonthCapture::Name),
        (&MONTH_DAY_NUMERIC, MonthCapture::Numeric),
    ] {
        if let Some(caps) = pattern.captures(text) {
            let month = match month_from {
                MonthCapture::Numeric => num(&caps, 1)?,
                MonthCapture::Name => month_name_to_num(caps.get(1)?.as_str())?,
            };
            let day = num(&caps, 2)?;
            if let Some(date) = yearless_date(month, day, anchor) {
                return Some(date);
            }
        }
    }
    None
}

enum MonthCapture {
    Numeric,
    Name,
}

/// A month/day without a year takes the anchor's year; months already past
/// at the anchor roll over to the next year.
fn yearless_date(month: u32, day: u32, anchor: DateTime<Utc>) -> Option<NaiveDate> {
    let mut year = anchor.year();
    if month < anchor.month() {
        year += 1;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_name_to_num(name: &str) -> Option<u32> {
    let num = match name.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(num)
}

fn num(caps: &regex::Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

// --- relative dates ---

static NEXT_WEEKDAY_KR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"다음\s*주\s*(월|화|수|목|금|토|일)요일").unwrap());
static THIS_WEEKDAY_KR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"이번\s*주\s*(월|화|수|목|금|토|일)요일").unwrap());
static NEXT_WEEKDAY_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnext\s+(mon|tue|wed|thu|fri|sat|sun)[a-z]*\b").unwrap()
});
static THIS_WEEKDAY_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bthis\s+(mon|tue|wed|thu|fri|sat|sun)[a-z]*\b").unwrap()
});
static BARE_WEEKDAY_KR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(월|화|수|목|금|토|일)요일(?:까지)?").unwrap());
static BARE_WEEKDAY_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tue|wed|thu|fri|sat|sun)\b",
    )
    .unwrap()
});
static WEEK_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*주\s*후|in\s+(\d+)\s+weeks?").unwrap());
static DAY_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*일\s*후|in\s+(\d+)\s+days?").unwrap());
static DAY_AFTER_TOMORROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)모레|day\s+after\s+tomorrow").unwrap());
static TOMORROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)내일|tomorrow").unwrap());
static NEXT_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)다음\s*주|next\s+week").unwrap());
static THIS_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)이번\s*주|this\s+week").unwrap());

fn parse_relative(text: &str, anchor: DateTime<Utc>) -> Option<NaiveDate> {
    let today = anchor.date_naive();

    // Compound week + weekday first, so "다음 주 금요일" does not fall
    // through to the bare "다음 주" rule.
    for (pattern, weekday_of) in [
        (&NEXT_WEEKDAY_KR, korean_weekday as fn(&str) -> Option<Weekday>),
        (&NEXT_WEEKDAY_EN, english_weekday),
    ] {
        if let Some(caps) = pattern.captures(text) {
            let target = weekday_of(caps.get(1)?.as_str())?;
            return Some(weekday_in_week(today, 1, target));
        }
    }
    for (pattern, weekday_of) in [
        (&THIS_WEEKDAY_KR, korean_weekday as fn(&str) -> Option<Weekday>),
        (&THIS_WEEKDAY_EN, english_weekday),
    ] {
        if let Some(caps) = pattern.captures(text) {
            let target = weekday_of(caps.get(1)?.as_str())?;
            return Some(weekday_in_week(today, 0, target));
        }
    }
    if let Some(caps) = BARE_WEEKDAY_KR.captures(text) {
        let target = korean_weekday(caps.get(1)?.as_str())?;
        return Some(next_weekday(today, target));
    }
    if let Some(caps) = BARE_WEEKDAY_EN.captures(text) {
        let target = english_weekday(caps.get(1)?.as_str())?;
        return Some(next_weekday(today, target));
    }
    if let Some(caps) = WEEK_OFFSET.captures(text) {
        let weeks: u64 = either_group(&caps)?;
        return today.checked_add_days(Days::new(weeks * 7));
    }
    if let Some(caps) = DAY_OFFSET.captures(text) {
        let days: u64 = either_group(&caps)?;
        return today.checked_add_days(Days::new(days));
    }
    if DAY_AFTER_TOMORROW.is_match(text) {
        return today.checked_add_days(Days::new(2));
    }
    if TOMORROW.is_match(text) {
        return today.checked_add_days(Days::new(1));
    }
    if NEXT_WEEK.is_match(text) {
        return today.checked_add_days(Days::new(7));
    }
    if THIS_WEEK.is_match(text) {
        return Some(today);
    }
    None
}

/// Alternated patterns capture the number in group 1 or 2.
fn either_group(caps: &regex::Captures<'_>) -> Option<u64> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn korean_weekday(name: &str) -> Option<Weekday> {
    let weekday = match name {
        "월" => Weekday::Mon,
        "화" => Weekday::Tue,
        "수" => Weekday::Wed,
        "목" => Weekday::Thu,
        "금" => Weekday::Fri,
        "토" => Weekday::Sat,
        "일" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

fn english_weekday(name: &str) -> Option<Weekday> {
    let weekday = match name.to_lowercase().get(..3)? {
        "mon" => Weekday::Mon,
        "tue" => Weekday::Tue,
        "wed" => Weekday::Wed,
        "thu" => Weekday::Thu,
        "fri" => Weekday::Fri,
        "sat" => Weekday::Sat,
        "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

/// The `target` weekday of the anchor's week plus `week_offset` weeks.
fn weekday_in_week(anchor: NaiveDate, week_offset: u64, target: Weekday) -> NaiveDate {
    let week_start = anchor - Days::new(anchor.weekday().num_days_from_monday() as u64);
    week_start + Days::new(week_offset * 7 + target.num_days_from_monday() as u64)
}

/// First occurrence of `target` strictly after the anchor.
fn next_weekday(anchor: NaiveDate, target: Weekday) -> NaiveDate {
    let mut ahead = target.num_days_from_monday() as i64
        - anchor.weekday().num_days_from_monday() as i64;
    if ahead <= 0 {
        ahead += 7;
    }
    anchor + Days::new(ahead as u64)
}

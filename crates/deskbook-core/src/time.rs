//! Site-local time helpers.
//!
//! The booking platform operates in a single fixed UTC offset. That offset is
//! treated as "local time" everywhere: calendar dates of bookings, the
//! today-or-later filter, and the reminder wall-clock hour.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday,
};

use crate::error::{AppError, AppResult};

/// Source of the current instant in site-local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// Site-local calendar date of `now()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock projected into the configured site offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    /// Convenience constructor: `date` at `hour:00` in `offset`.
    pub fn at(offset: FixedOffset, date: NaiveDate, hour: u32) -> Self {
        let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        Self {
            now: local_instant(offset, date, time),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }
}

/// Parse an offset of the form `+05:30` / `-04:00`.
pub fn parse_utc_offset(raw: &str) -> AppResult<FixedOffset> {
    let invalid = || AppError::InvalidValue {
        what: "utc offset",
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidDate(raw.to_string()))
}

/// Parse a 24-hour `HH:MM` wall-clock time.
pub fn parse_hhmm(raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| AppError::InvalidValue {
        what: "time of day",
        value: raw.to_string(),
    })
}

/// Parse a weekday name (`Sun`, `sunday`, ...).
pub fn parse_weekday(raw: &str) -> AppResult<Weekday> {
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| AppError::InvalidValue {
            what: "weekday",
            value: raw.to_string(),
        })
}

/// Interpret `date` + `time` as wall-clock time in `offset`.
pub fn local_instant(offset: FixedOffset, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
    let naive = NaiveDateTime::new(date, time);
    let utc = naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

/// Same as [`local_instant`], expressed in UTC.
pub fn local_to_utc(offset: FixedOffset, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    local_instant(offset, date, time).with_timezone(&Utc)
}

/// ISO-8601 UTC with millisecond precision, e.g. `2025-03-10T03:30:00.000Z`.
pub fn format_utc_millis(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Long day label used in booking mails: `Monday, March 10th`.
pub fn format_day_long(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (1, n) if n != 11 => "st",
        (2, n) if n != 12 => "nd",
        (3, n) if n != 13 => "rd",
        _ => "th",
    };
    format!("{}{}", date.format("%A, %B %-d"), suffix)
}

/// 12-hour clock label: `9:00 AM`, `12:30 PM`.
pub fn format_time_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Short human date used in progress lines and reminders: `Mar 10, 2025`.
pub fn format_date_short(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

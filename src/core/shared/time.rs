use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Parses a 24-hour `HH:MM` or `HH:MM:SS` clock time.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

pub fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Inverse of [`minutes_of_day`]; `None` at or past midnight.
pub fn time_from_minutes(minutes: u32) -> Option<NaiveTime> {
    if minutes >= MINUTES_PER_DAY {
        return None;
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// 0 = Sunday through 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_sunday() as i16
}

pub fn weekday_name(day_of_week: i16) -> &'static str {
    usize::try_from(day_of_week)
        .ok()
        .and_then(|d| WEEKDAY_NAMES.get(d))
        .copied()
        .unwrap_or("Unknown")
}

pub fn format_clock_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Spoken form used in tool results and emails, e.g. `2:30 PM`.
pub fn format_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

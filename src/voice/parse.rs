use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};

use crate::core::shared::time::parse_clock_time;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d %Y", "%b %d %Y"];

fn parse_weekday(value: &str) -> Option<Weekday> {
    match value {
        "sunday" | "sun" => Some(Weekday::Sun),
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Drops `st`, `nd`, `rd` and `th` after digits and commas: `June 3rd, 2024` -> `june 3 2024`.
fn strip_ordinals(value: &str) -> String {
    let cleaned = value.replace(',', " ");
    cleaned
        .split_whitespace()
        .map(|word| {
            let digits = word.trim_end_matches(|c: char| c.is_ascii_alphabetic());
            if !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
                && matches!(&word[digits.len()..], "st" | "nd" | "rd" | "th")
            {
                digits.to_string()
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses dates the way callers say them, relative to the business's `today`.
///
/// Accepts ISO and US numeric dates, `today`, `tomorrow`, `day after tomorrow`,
/// weekday names (`friday`, `next friday` are the next one after today, `this friday`
/// may be today) and month-day phrases with or without a year.
pub fn parse_voice_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let value = strip_ordinals(&input.trim().to_lowercase());
    let value = value.strip_prefix("on ").unwrap_or(&value).trim().to_string();

    match value.as_str() {
        "today" | "tonight" => return Some(today),
        "tomorrow" => return today.checked_add_signed(Duration::days(1)),
        "day after tomorrow" | "the day after tomorrow" => {
            return today.checked_add_signed(Duration::days(2))
        }
        _ => {}
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&value, format) {
            return Some(date);
        }
    }

    let (allow_today, name) = if let Some(rest) = value.strip_prefix("this ") {
        (true, rest)
    } else {
        (false, value.strip_prefix("next ").unwrap_or(&value))
    };
    if let Some(weekday) = parse_weekday(name.trim()) {
        let ahead = (weekday.num_days_from_sunday() as i64 - today.weekday().num_days_from_sunday() as i64)
            .rem_euclid(7);
        let ahead = if ahead == 0 && !allow_today { 7 } else { ahead };
        return today.checked_add_signed(Duration::days(ahead));
    }

    // "june 3" without a year: this year, or next year once the day has passed.
    for format in ["%B %d %Y", "%b %d %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{value} {}", today.year()), format) {
            if date >= today {
                return Some(date);
            }
            return date.with_year(today.year() + 1);
        }
    }
    None
}

/// Parses `14:30`, `14:30:00`, `3pm`, `3 PM`, `3:30 p.m.`, `noon` and `midnight`.
pub fn parse_voice_time(input: &str) -> Option<NaiveTime> {
    let value = input.trim().to_lowercase().replace('.', "");
    match value.as_str() {
        "noon" | "midday" | "12 noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }
    if let Some(time) = parse_clock_time(&value) {
        return Some(time);
    }

    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let (body, pm) = if let Some(body) = compact.strip_suffix("pm") {
        (body, true)
    } else if let Some(body) = compact.strip_suffix("am") {
        (body, false)
    } else {
        return None;
    };

    let (hour, minute) = match body.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (body.parse::<u32>().ok()?, 0),
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_relative_dates() {
        assert_eq!(parse_voice_date("today", today()), Some(today()));
        assert_eq!(parse_voice_date(" Tomorrow ", today()), Some(d(2024, 6, 4)));
        assert_eq!(parse_voice_date("day after tomorrow", today()), Some(d(2024, 6, 5)));
    }

    #[test]
    fn test_numeric_dates() {
        assert_eq!(parse_voice_date("2024-06-10", today()), Some(d(2024, 6, 10)));
        assert_eq!(parse_voice_date("06/10/2024", today()), Some(d(2024, 6, 10)));
        assert_eq!(parse_voice_date("2024-13-01", today()), None);
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(parse_voice_date("friday", today()), Some(d(2024, 6, 7)));
        assert_eq!(parse_voice_date("on Friday", today()), Some(d(2024, 6, 7)));
        assert_eq!(parse_voice_date("monday", today()), Some(d(2024, 6, 10)));
        assert_eq!(parse_voice_date("next monday", today()), Some(d(2024, 6, 10)));
        assert_eq!(parse_voice_date("this monday", today()), Some(today()));
        assert_eq!(parse_voice_date("sunday", today()), Some(d(2024, 6, 9)));
    }

    #[test]
    fn test_month_day_phrases() {
        assert_eq!(parse_voice_date("June 10th", today()), Some(d(2024, 6, 10)));
        assert_eq!(parse_voice_date("june 3rd, 2025", today()), Some(d(2025, 6, 3)));
        assert_eq!(parse_voice_date("May 1st", today()), Some(d(2025, 5, 1)));
        assert_eq!(parse_voice_date("someday", today()), None);
    }

    #[test]
    fn test_clock_and_spoken_times() {
        assert_eq!(parse_voice_time("14:30"), Some(t(14, 30)));
        assert_eq!(parse_voice_time("09:00:00"), Some(t(9, 0)));
        assert_eq!(parse_voice_time("3pm"), Some(t(15, 0)));
        assert_eq!(parse_voice_time("3 PM"), Some(t(15, 0)));
        assert_eq!(parse_voice_time("3:30 p.m."), Some(t(15, 30)));
        assert_eq!(parse_voice_time("10:15am"), Some(t(10, 15)));
        assert_eq!(parse_voice_time("12 am"), Some(t(0, 0)));
        assert_eq!(parse_voice_time("12pm"), Some(t(12, 0)));
        assert_eq!(parse_voice_time("noon"), Some(t(12, 0)));
    }

    #[test]
    fn test_rejects_ambiguous_times() {
        assert_eq!(parse_voice_time("3"), None);
        assert_eq!(parse_voice_time("13pm"), None);
        assert_eq!(parse_voice_time("half past"), None);
    }
}

use chrono::{NaiveTime, Timelike};
use serde::Serialize;

use crate::catalog::{AvailabilityWindow, CatalogError};
use crate::core::shared::time::{minutes_of_day, time_from_minutes};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Seats still free at this start time.
    pub remaining: i32,
}

/// A booking that holds a seat on the day being computed.
#[derive(Debug, Clone, Copy)]
pub struct OccupiedInterval {
    pub start: NaiveTime,
    pub duration_minutes: i32,
}

impl OccupiedInterval {
    fn bounds(&self) -> (u32, u32) {
        let start = minutes_of_day(self.start);
        (start, start + self.duration_minutes.max(0) as u32)
    }
}

/// Minute of day, rounded up when the time is past the start of its minute.
fn ceil_minutes(time: NaiveTime) -> u32 {
    let minutes = minutes_of_day(time);
    if time.second() > 0 || time.nanosecond() > 0 {
        minutes + 1
    } else {
        minutes
    }
}

fn overlaps(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Candidate start times of one service on one day.
///
/// Starts at `open_time` and steps by `duration + break_between_minutes`. A candidate
/// survives when it ends by `close_time`, misses every break window, starts at or
/// after `not_before` and has fewer than `max_concurrent` overlapping bookings.
pub fn compute_slots(
    window: &AvailabilityWindow,
    duration_minutes: i32,
    occupied: &[OccupiedInterval],
    not_before: Option<NaiveTime>,
) -> Result<Vec<Slot>, CatalogError> {
    if duration_minutes <= 0 {
        return Err(CatalogError::Validation(
            "Service duration must be greater than zero".to_string(),
        ));
    }
    if !window.is_available {
        return Ok(Vec::new());
    }

    let duration = duration_minutes as u32;
    let step = duration + window.break_between_minutes.max(0) as u32;
    let open = minutes_of_day(window.open_time);
    let close = minutes_of_day(window.close_time);
    let floor = not_before.map(ceil_minutes).unwrap_or(0);
    let capacity = window.max_concurrent.max(1);

    let breaks: Vec<(u32, u32)> = window
        .breaks
        .iter()
        .map(|b| (minutes_of_day(b.start_time), minutes_of_day(b.end_time)))
        .collect();
    let taken: Vec<(u32, u32)> = occupied.iter().map(OccupiedInterval::bounds).collect();

    let mut slots = Vec::new();
    let mut start = open;
    while start + duration <= close {
        let candidate = (start, start + duration);
        if start >= floor && !breaks.iter().any(|b| overlaps(*b, candidate)) {
            let used = taken.iter().filter(|t| overlaps(**t, candidate)).count() as i32;
            if used < capacity {
                if let (Some(s), Some(e)) = (time_from_minutes(candidate.0), time_from_minutes(candidate.1)) {
                    slots.push(Slot {
                        start: s,
                        end: e,
                        remaining: capacity - used,
                    });
                }
            }
        }
        start += step;
    }
    Ok(slots)
}

pub fn slot_starting_at(slots: &[Slot], time: NaiveTime) -> Option<&Slot> {
    slots.iter().find(|s| s.start == time)
}

/// Up to `limit` slots ordered by distance from the requested time.
pub fn nearest_slots(slots: &[Slot], time: NaiveTime, limit: usize) -> Vec<Slot> {
    let target = minutes_of_day(time) as i64;
    let mut sorted: Vec<Slot> = slots.to_vec();
    sorted.sort_by_key(|s| ((minutes_of_day(s.start) as i64 - target).abs(), s.start));
    sorted.truncate(limit);
    sorted.sort_by_key(|s| s.start);
    sorted
}

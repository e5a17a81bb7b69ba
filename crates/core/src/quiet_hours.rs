//! Time-of-day window evaluation for quiet hours.
//!
//! Windows are expressed as minutes since local midnight. A window whose start
//! is after its end wraps past midnight (e.g. `22:00`-`08:00`).

use chrono::Timelike;

use crate::types::Timestamp;

/// Number of minutes in a day.
pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// Parse an `HH:MM` (or `H:MM`) string into minutes since midnight.
///
/// Returns `None` for anything outside `00:00`..=`23:59`.
pub fn parse_hhmm(value: &str) -> Option<u16> {
    let (hours, minutes) = value.trim().split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Format minutes since midnight as a zero-padded `HH:MM` string.
pub fn format_hhmm(minute_of_day: u16) -> String {
    format!("{:02}:{:02}", minute_of_day / 60, minute_of_day % 60)
}

/// Whether `now` falls inside the `[start, end)` window.
///
/// - `start <= end`: same-day window, blocked when `start <= now < end`.
/// - `start > end`: wraps past midnight, blocked when `now >= start || now < end`.
pub fn is_within_window(start: u16, end: u16, now: u16) -> bool {
    if start <= end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

/// Local minute-of-day for a UTC instant at a fixed UTC offset.
pub fn local_minute_of_day(now: Timestamp, utc_offset_minutes: i32) -> u16 {
    let utc_minutes = (now.hour() * 60 + now.minute()) as i32;
    (utc_minutes + utc_offset_minutes).rem_euclid(MINUTES_PER_DAY) as u16
}

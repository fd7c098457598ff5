// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Input checks shared by the handlers and the importer.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

pub const DEFAULT_COLOR: &str = "#6c5ce7";
/// Stored category value the web client renders as "Other".
pub const DEFAULT_CATEGORY: &str = "其他";
pub const DEFAULT_PRIORITY: i64 = 2;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_CATEGORY_LEN: usize = 50;
pub const MAX_NOTE_LEN: usize = 100_000;
pub const MAX_RANGE_DAYS: i64 = 366;

pub const LANGUAGES: &[&str] = &["en", "zh-CN", "zh-TW", "fr", "de", "ja", "ar", "he"];

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    static ref COLOR_RE: Regex = Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"^(\d{2}):(\d{2})$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_color(color: &str) -> bool {
    COLOR_RE.is_match(color)
}

/// Minutes since midnight for an `HH:MM` string. `24:00` is accepted as the
/// end of the day.
pub fn minutes_of_day(time: &str) -> Option<u32> {
    let caps = TIME_RE.captures(time)?;
    let hours: u32 = caps[1].parse().ok()?;
    let minutes: u32 = caps[2].parse().ok()?;
    match (hours, minutes) {
        (24, 0) => Some(24 * 60),
        (h, m) if h < 24 && m < 60 => Some(h * 60 + m),
        _ => None,
    }
}

pub fn validate_time_span(start: &str, end: &str) -> Result<(), &'static str> {
    let (Some(start), Some(end)) = (minutes_of_day(start), minutes_of_day(end)) else {
        return Err("Times must use the HH:MM format.");
    };
    if start >= end {
        return Err("The end time must be after the start time.");
    }
    Ok(())
}

/// Length of a span in minutes; zero for malformed or inverted spans.
pub fn span_minutes(start: &str, end: &str) -> i64 {
    match (minutes_of_day(start), minutes_of_day(end)) {
        (Some(s), Some(e)) if e > s => i64::from(e - s),
        _ => 0,
    }
}

pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), String> {
    if start > end {
        return Err("The start date must not be after the end date.".to_string());
    }
    if (end - start).num_days() >= MAX_RANGE_DAYS {
        return Err(format!(
            "The date range cannot exceed {MAX_RANGE_DAYS} days."
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    let length = password.chars().count();
    if length < 8 {
        return Err("Password must be at least 8 characters long.");
    }
    if length > 128 {
        return Err("Password cannot exceed 128 characters.");
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("Password must contain a letter.");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit.");
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let length = username.chars().count();
    if !(2..=30).contains(&length) {
        return Err("Username must be between 2 and 30 characters.");
    }
    Ok(())
}

/// Cuts a string to at most `max` characters, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub fn clamp_priority(priority: Option<i64>) -> i64 {
    priority.unwrap_or(DEFAULT_PRIORITY).clamp(1, 3)
}

/// Parses the `"1"`/`"true"` flags the web client sends as query parameters.
pub fn is_truthy(flag: Option<&str>) -> bool {
    matches!(flag, Some("1") | Some("true") | Some("yes") | Some("on"))
}

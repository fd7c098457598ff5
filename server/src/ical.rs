// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! iCalendar (RFC 5545) rendering of logged-actual events.

use chrono::{Duration, NaiveDate};
use planner_common::Event;

use crate::validation::minutes_of_day;

const MAX_LINE_OCTETS: usize = 75;

/// Escapes a TEXT value.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}

/// Folds a content line into chunks of at most 75 octets. Continuation lines
/// start with a single space, which counts towards their 75 octets. A UTF-8
/// sequence is never split.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut folded = String::with_capacity(line.len() + line.len() / 25);
    let mut rest = line;
    let mut limit = MAX_LINE_OCTETS;
    while !rest.is_empty() {
        let mut cut = limit.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if !folded.is_empty() {
            folded.push_str("\r\n ");
        }
        folded.push_str(&rest[..cut]);
        rest = &rest[cut..];
        limit = MAX_LINE_OCTETS - 1;
    }
    folded
}

/// `YYYYMMDDTHHMMSSZ`; `24:00` rolls over to midnight of the next day.
fn timestamp(date: NaiveDate, time: &str) -> Option<String> {
    let minutes = minutes_of_day(time)?;
    let (date, minutes) = if minutes == 24 * 60 {
        (date + Duration::days(1), 0)
    } else {
        (date, minutes)
    };
    Some(format!(
        "{}T{:02}{:02}00Z",
        date.format("%Y%m%d"),
        minutes / 60,
        minutes % 60
    ))
}

/// Renders a calendar with one VEVENT per event. Events with unreadable
/// times are left out.
pub fn render_calendar(events: &[Event]) -> String {
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".into(),
        "VERSION:2.0".into(),
        "PRODID:-//SchedulePlanner//EN".into(),
        "CALSCALE:GREGORIAN".into(),
        "METHOD:PUBLISH".into(),
        "X-WR-CALNAME:Schedule Planner".into(),
        "X-WR-TIMEZONE:UTC".into(),
    ];

    for event in events {
        let (Some(start), Some(end)) = (
            timestamp(event.date, &event.start_time),
            timestamp(event.date, &event.end_time),
        ) else {
            continue;
        };
        lines.push("BEGIN:VEVENT".into());
        lines.push(format!("UID:event-{}@schedule-planner", event.id));
        lines.push(format!("DTSTAMP:{}", event.updated_at.format("%Y%m%dT%H%M%SZ")));
        lines.push(format!("DTSTART:{}", start));
        lines.push(format!("DTEND:{}", end));
        lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
        if !event.description.is_empty() {
            lines.push(format!("DESCRIPTION:{}", escape_text(&event.description)));
        }
        lines.push(format!("CATEGORIES:{}", escape_text(&event.category)));
        if event.completed {
            lines.push("STATUS:COMPLETED".into());
        }
        lines.push("END:VEVENT".into());
    }
    lines.push("END:VCALENDAR".into());

    let mut calendar = lines
        .iter()
        .map(|line| fold_line(line))
        .collect::<Vec<_>>()
        .join("\r\n");
    calendar.push_str("\r\n");
    calendar
}

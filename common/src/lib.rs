// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Distinguishes a planned entry from a logged-actual entry for the same
/// conceptual task. Stored as lowercase text in the `col_type` column.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ColType {
    #[default]
    Plan,
    Actual,
}

impl ColType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColType::Plan => "plan",
            ColType::Actual => "actual",
        }
    }
}

/// How a recurring template repeats.
///
/// The rule is kept as free text on the event row so that unknown values
/// coming from imports or older clients never break reads; use
/// [`RecurRule::parse`] to interpret it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurRule {
    Daily,
    Weekdays,
    Weekly,
    Monthly,
}

impl RecurRule {
    /// Lenient parse: anything that is not a known rule means "no recurrence".
    pub fn parse(raw: Option<&str>) -> Option<RecurRule> {
        raw.and_then(|s| s.trim().parse().ok())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurRule::Daily => "daily",
            RecurRule::Weekdays => "weekdays",
            RecurRule::Weekly => "weekly",
            RecurRule::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RecurRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(RecurRule::Daily),
            "weekdays" => Ok(RecurRule::Weekdays),
            "weekly" => Ok(RecurRule::Weekly),
            "monthly" => Ok(RecurRule::Monthly),
            other => Err(format!("unknown recurrence rule: {other}")),
        }
    }
}

/// A calendar entry owned by one user.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: conversion to/from JSON.
/// - `sqlx::FromRow`: built directly from a row of the `events` table.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,

    // Only the day matters, without a timezone.
    pub date: NaiveDate,

    // "HH:MM", end may be "24:00".
    pub start_time: String,
    pub end_time: String,

    pub color: String,
    pub category: String,
    pub priority: i64, // 1 = high, 2 = medium, 3 = low
    pub completed: bool,
    pub col_type: ColType,

    /// Set only on the template row of a recurring series.
    pub recur_rule: Option<String>,
    /// Set only on generated instances, pointing at the template.
    pub recur_parent_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body accepted by the create and update event endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EventPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub col_type: Option<ColType>,
    #[serde(default)]
    pub recur_rule: Option<String>,
    /// On creation of a plan row, also insert the matching actual row.
    #[serde(default)]
    pub with_actual: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateEventResponse {
    pub event: Event,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub actual: Option<Event>,
}

/// One item of a drag-and-drop batch reschedule.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchTimeUpdate {
    pub id: i64,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Archived snapshot of a deleted event, kept until the retention sweep.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct DeletedEvent {
    pub id: i64,
    pub user_id: i64,
    pub original_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub color: String,
    pub category: String,
    pub priority: i64,
    pub completed: bool,
    pub col_type: ColType,
    pub recur_rule: Option<String>,
    pub recur_parent_id: Option<i64>,
    pub deleted_at: DateTime<Utc>,
}

/// Free-text note attached to a day.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NotePayload {
    pub date: NaiveDate,
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NoteContentPayload {
    pub content: String,
}

/// A completed or abandoned focus-timer session.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct TimerRecord {
    pub id: i64,
    pub user_id: i64,
    pub task_name: String,
    pub planned_minutes: i64,
    pub actual_seconds: i64,
    pub date: NaiveDate,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TimerRecordPayload {
    pub task_name: String,
    pub planned_minutes: i64,
    pub actual_seconds: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimerStats {
    pub total: i64,
    pub completed: i64,
    pub total_seconds: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DayStats {
    pub total: i64,
    pub completed: i64,
    pub total_hours: f64,
    pub completion_rate: i64,
    pub daily_goal_hours: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Analytics {
    pub events: Vec<Event>,
    pub timer_records: Vec<TimerRecord>,
}

/// Reusable event preset ("template" in the UI). Unrelated to recurrence.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct EventTemplate {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: i64,
    pub color: String,
    pub category: String,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EventTemplatePayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Public view of an account. The password hash column is never selected
/// into this struct.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub avatar: String,
    pub bio: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: i64,
    pub daily_goal_hours: f64,
}

/// One signed-in device as listed on the account page.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeviceSession {
    pub id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub is_current: bool,
}

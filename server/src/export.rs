// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Account data export (JSON, CSV) and JSON import.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use planner_common::{ColType, Event, Note, TimerRecord, User};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use crate::database::events::{NewEvent, insert_event};
use crate::validation::{
    DEFAULT_CATEGORY, DEFAULT_COLOR, DEFAULT_PRIORITY, MAX_CATEGORY_LEN, MAX_DESCRIPTION_LEN, MAX_NOTE_LEN,
    MAX_TITLE_LEN, is_valid_color, truncate_chars, validate_time_span,
};

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Serialize)]
pub struct ExportedUser {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExportedEvent {
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for ExportedEvent {
    fn from(e: Event) -> Self {
        Self {
            title: e.title,
            description: e.description,
            date: e.date,
            start_time: e.start_time,
            end_time: e.end_time,
            color: e.color,
            category: e.category,
            priority: e.priority,
            completed: e.completed,
            col_type: e.col_type,
            recur_rule: e.recur_rule,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportedTimerRecord {
    pub task_name: String,
    pub planned_minutes: i64,
    pub actual_seconds: i64,
    pub date: NaiveDate,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<TimerRecord> for ExportedTimerRecord {
    fn from(r: TimerRecord) -> Self {
        Self {
            task_name: r.task_name,
            planned_minutes: r.planned_minutes,
            actual_seconds: r.actual_seconds,
            date: r.date,
            completed: r.completed,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportedNote {
    pub date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DataExport {
    pub exported_at: DateTime<Utc>,
    pub user: ExportedUser,
    pub events: Vec<ExportedEvent>,
    pub timer_records: Vec<ExportedTimerRecord>,
    pub notes: Vec<ExportedNote>,
}

/// Builds the JSON export. Row ids are left out and blank notes skipped.
pub fn build_export(
    user: User,
    events: Vec<Event>,
    timer_records: Vec<TimerRecord>,
    notes: Vec<Note>,
    now: DateTime<Utc>,
) -> DataExport {
    DataExport {
        exported_at: now,
        user: ExportedUser {
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        },
        events: events.into_iter().map(ExportedEvent::from).collect(),
        timer_records: timer_records.into_iter().map(ExportedTimerRecord::from).collect(),
        notes: notes
            .into_iter()
            .filter(|n| !n.content.trim().is_empty())
            .map(|n| ExportedNote {
                date: n.date,
                content: n.content,
                created_at: n.created_at,
                updated_at: n.updated_at,
            })
            .collect(),
    }
}

fn priority_label(priority: i64) -> &'static str {
    match priority {
        1 => "High",
        3 => "Low",
        _ => "Medium",
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn write_section<I>(out: &mut String, title: &str, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    let bytes = wtr.into_inner().context("Failed to flush CSV section")?;

    out.push_str(&format!("=== {} ===\n", title));
    out.push_str(&String::from_utf8(bytes).context("CSV section is not valid UTF-8")?);
    Ok(())
}

/// Spreadsheet-friendly CSV: a UTF-8 BOM, then an events section and a
/// timer section separated by a blank line.
pub fn render_csv(events: &[Event], timer_records: &[TimerRecord]) -> Result<String> {
    let mut out = String::from(UTF8_BOM);

    write_section(
        &mut out,
        "Events",
        &["Date", "Title", "Start", "End", "Category", "Priority", "Type", "Completed", "Notes"],
        events.iter().map(|e| {
            vec![
                e.date.to_string(),
                e.title.clone(),
                e.start_time.clone(),
                e.end_time.clone(),
                e.category.clone(),
                priority_label(e.priority).to_string(),
                if e.col_type == ColType::Plan { "Plan" } else { "Actual" }.to_string(),
                yes_no(e.completed).to_string(),
                e.description.replace(['\r', '\n'], " "),
            ]
        }),
    )?;

    out.push('\n');
    write_section(
        &mut out,
        "Timer records",
        &["Date", "Task", "Planned (min)", "Actual (min)", "Completed"],
        timer_records.iter().map(|r| {
            vec![
                r.date.to_string(),
                r.task_name.clone(),
                r.planned_minutes.to_string(),
                format!("{:.1}", r.actual_seconds as f64 / 60.0),
                yes_no(r.completed).to_string(),
            ]
        }),
    )?;

    Ok(out)
}

// --- Import ---

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub events: usize,
    pub timer_records: usize,
    pub notes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTimerRecord {
    pub task_name: String,
    pub planned_minutes: i64,
    pub actual_seconds: i64,
    pub date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedNote {
    pub date: NaiveDate,
    pub content: String,
}

fn text<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

fn date_of(row: &Value) -> Option<NaiveDate> {
    text(row, "date").and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
}

fn flag(row: &Value, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    }
}

fn integer(row: &Value, key: &str) -> Option<i64> {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        None | Some(Value::Null) => Some(0),
        _ => None,
    }
}

/// Validates one imported event row. Bad optional fields fall back to
/// defaults; bad required fields reject the row.
pub fn sanitize_event(row: &Value) -> Option<NewEvent> {
    let title = text(row, "title")?.trim();
    if title.is_empty() {
        return None;
    }
    let date = date_of(row)?;
    let start_time = text(row, "start_time")?.to_string();
    let end_time = text(row, "end_time")?.to_string();
    validate_time_span(&start_time, &end_time).ok()?;

    let col_type = match text(row, "col_type") {
        Some("actual") => ColType::Actual,
        _ => ColType::Plan,
    };
    let priority = match row.get("priority").and_then(Value::as_i64) {
        Some(p @ 1..=3) => p,
        _ => DEFAULT_PRIORITY,
    };
    let color = text(row, "color")
        .filter(|c| is_valid_color(c))
        .unwrap_or(DEFAULT_COLOR)
        .to_string();
    let category = text(row, "category")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| truncate_chars(c, MAX_CATEGORY_LEN))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    Some(NewEvent {
        title: truncate_chars(title, MAX_TITLE_LEN),
        description: truncate_chars(text(row, "description").unwrap_or(""), MAX_DESCRIPTION_LEN),
        date,
        start_time,
        end_time,
        color,
        category,
        priority,
        completed: flag(row, "completed"),
        col_type,
        recur_rule: None,
        recur_parent_id: None,
    })
}

pub fn sanitize_timer_record(row: &Value) -> Option<ImportedTimerRecord> {
    let task_name = text(row, "task_name")?.trim();
    if task_name.is_empty() {
        return None;
    }
    let date = date_of(row)?;
    let planned_minutes = integer(row, "planned_minutes")?.clamp(0, 1440);
    let actual_seconds = integer(row, "actual_seconds")?.clamp(0, 86_400);

    Some(ImportedTimerRecord {
        task_name: truncate_chars(task_name, MAX_TITLE_LEN),
        planned_minutes,
        actual_seconds,
        date,
        completed: flag(row, "completed"),
    })
}

pub fn sanitize_note(row: &Value) -> Option<ImportedNote> {
    let date = date_of(row)?;
    let content = text(row, "content")?;
    if content.trim().is_empty() {
        return None;
    }
    Some(ImportedNote {
        date,
        content: truncate_chars(content, MAX_NOTE_LEN),
    })
}

fn rows<'a>(payload: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|rows| rows.iter())
        .into_iter()
        .flatten()
}

/// Imports an export document for `user_id` in one transaction. Invalid rows
/// are skipped.
pub async fn import_in_db(
    pool: &SqlitePool,
    user_id: i64,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<ImportCounts> {
    let events: Vec<NewEvent> = rows(payload, "events").filter_map(sanitize_event).collect();
    let timer_records: Vec<ImportedTimerRecord> =
        rows(payload, "timer_records").filter_map(sanitize_timer_record).collect();
    let notes: Vec<ImportedNote> = rows(payload, "notes").filter_map(sanitize_note).collect();

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for event in &events {
        insert_event(&mut *tx, user_id, event, now).await?;
    }

    for record in &timer_records {
        sqlx::query(
            "INSERT INTO timer_records (user_id, task_name, planned_minutes, actual_seconds, date, completed, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&record.task_name)
        .bind(record.planned_minutes)
        .bind(record.actual_seconds)
        .bind(record.date)
        .bind(record.completed)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to import timer record")?;
    }

    for note in &notes {
        sqlx::query("INSERT INTO notes (user_id, date, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(user_id)
            .bind(note.date)
            .bind(&note.content)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to import note")?;
    }

    tx.commit().await.context("Failed to commit import")?;

    let counts = ImportCounts {
        events: events.len(),
        timer_records: timer_records.len(),
        notes: notes.len(),
    };
    info!("Imported {:?} for user {}", counts, user_id);
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_event_rows_are_validated_and_defaulted() {
        let ok = sanitize_event(&json!({
            "title": "  Read  ",
            "date": "2024-10-02",
            "start_time": "08:00",
            "end_time": "09:00",
            "color": "blue",
            "priority": 7,
            "col_type": "weird",
            "completed": 1
        }))
        .unwrap();
        assert_eq!(ok.title, "Read");
        assert_eq!(ok.color, DEFAULT_COLOR);
        assert_eq!(ok.priority, DEFAULT_PRIORITY);
        assert_eq!(ok.col_type, ColType::Plan);
        assert_eq!(ok.category, DEFAULT_CATEGORY);
        assert!(ok.completed);

        assert!(sanitize_event(&json!({"title": "", "date": "2024-10-02", "start_time": "08:00", "end_time": "09:00"})).is_none());
        assert!(sanitize_event(&json!({"title": "x", "date": "02/10/2024", "start_time": "08:00", "end_time": "09:00"})).is_none());
        assert!(sanitize_event(&json!({"title": "x", "date": "2024-10-02", "start_time": "9am", "end_time": "09:00"})).is_none());
    }

    #[test]
    fn test_timer_rows_are_clamped() {
        let record = sanitize_timer_record(&json!({
            "task_name": "Focus",
            "date": "2024-10-02",
            "planned_minutes": 5000,
            "actual_seconds": -3
        }))
        .unwrap();
        assert_eq!(record.planned_minutes, 1440);
        assert_eq!(record.actual_seconds, 0);

        assert!(sanitize_timer_record(&json!({"task_name": "x", "date": "2024-10-02", "planned_minutes": "lots"})).is_none());
    }

    #[test]
    fn test_csv_has_bom_and_two_sections() {
        let at = now();
        let event = Event {
            id: 1,
            user_id: 1,
            title: "Write, review".to_string(),
            description: "a\nb".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
            start_time: "08:00".to_string(),
            end_time: "09:00".to_string(),
            color: DEFAULT_COLOR.to_string(),
            category: "work".to_string(),
            priority: 1,
            completed: false,
            col_type: ColType::Plan,
            recur_rule: None,
            recur_parent_id: None,
            created_at: at,
            updated_at: at,
        };
        let record = TimerRecord {
            id: 1,
            user_id: 1,
            task_name: "Focus".to_string(),
            planned_minutes: 25,
            actual_seconds: 1530,
            date: NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
            completed: true,
            created_at: at,
        };

        let csv = render_csv(&[event], &[record]).unwrap();
        assert!(csv.starts_with('\u{feff}'));
        assert!(csv.contains("=== Events ===\n"));
        assert!(csv.contains("2024-10-02,\"Write, review\",08:00,09:00,work,High,Plan,No,a b\n"));
        assert!(csv.contains("\n\n=== Timer records ===\n"));
        assert!(csv.contains("2024-10-02,Focus,25,25.5,Yes\n"));
    }

    #[tokio::test]
    async fn test_import_skips_invalid_rows() {
        let pool = crate::database::in_memory_pool().await.unwrap();
        let payload = json!({
            "events": [
                {"title": "Ok", "date": "2024-10-02", "start_time": "08:00", "end_time": "09:00"},
                {"title": "Bad", "date": "nope", "start_time": "08:00", "end_time": "09:00"}
            ],
            "timer_records": [{"task_name": "Focus", "date": "2024-10-02", "actual_seconds": 60}],
            "notes": [{"date": "2024-10-02", "content": "kept"}, {"date": "2024-10-02", "content": "  "}]
        });

        let counts = import_in_db(&pool, 5, &payload, now()).await.unwrap();
        assert_eq!(
            counts,
            ImportCounts {
                events: 1,
                timer_records: 1,
                notes: 1
            }
        );
        let notes = crate::database::notes::list_all_notes(&pool, 5).await.unwrap();
        assert_eq!(notes[0].content, "kept");
    }
}

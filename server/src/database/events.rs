// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use planner_common::{BatchTimeUpdate, ColType, Event};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// Column values of an event row, as validated by the handlers.
#[derive(Debug, Clone)]
pub struct NewEvent {
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
}

/// Inserts one event row and returns its id. Works on the pool or inside a
/// transaction.
pub async fn insert_event<'e, E>(
    executor: E,
    user_id: i64,
    event: &NewEvent,
    now: DateTime<Utc>,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    write_event_row(executor, None, user_id, event, now).await
}

/// Inserts an event row under a given id. The id must be free.
pub async fn insert_event_with_id<'e, E>(
    executor: E,
    id: i64,
    user_id: i64,
    event: &NewEvent,
    now: DateTime<Utc>,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    write_event_row(executor, Some(id), user_id, event, now).await
}

// A NULL id lets SQLite assign the next rowid.
async fn write_event_row<'e, E>(
    executor: E,
    id: Option<i64>,
    user_id: i64,
    event: &NewEvent,
    now: DateTime<Utc>,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query(
        "INSERT INTO events (id, user_id, title, description, date, start_time, end_time, color, category, priority, completed, col_type, recur_rule, recur_parent_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.date)
    .bind(&event.start_time)
    .bind(&event.end_time)
    .bind(&event.color)
    .bind(&event.category)
    .bind(event.priority)
    .bind(event.completed)
    .bind(event.col_type)
    .bind(&event.recur_rule)
    .bind(event.recur_parent_id)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await
    .context("Failed to insert event into DB")?
    .last_insert_rowid();

    Ok(id)
}

pub async fn fetch_event<'e, E>(executor: E, user_id: i64, event_id: i64) -> Result<Option<Event>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ? AND user_id = ?")
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .with_context(|| format!("Failed to fetch event with ID: {}", event_id))
}

/// Creates an event. When `with_actual` is set on a plan row, the actual copy
/// is written in the same transaction.
pub async fn create_event_in_db(
    pool: &SqlitePool,
    user_id: i64,
    event: NewEvent,
    with_actual: bool,
    now: DateTime<Utc>,
) -> Result<(Event, Option<Event>)> {
    debug!(
        "Insert values: user_id={}, title={}, date={}, {}-{}, col_type={}, recur_rule={:?}",
        user_id,
        event.title,
        event.date,
        event.start_time,
        event.end_time,
        event.col_type.as_str(),
        event.recur_rule
    );

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = insert_event(&mut *tx, user_id, &event, now).await?;

    let actual_id = if with_actual && event.col_type == ColType::Plan {
        let actual = NewEvent {
            col_type: ColType::Actual,
            completed: false,
            recur_rule: None,
            recur_parent_id: None,
            ..event
        };
        Some(insert_event(&mut *tx, user_id, &actual, now).await?)
    } else {
        None
    };

    let created = fetch_event(&mut *tx, user_id, id)
        .await?
        .context("Inserted event could not be read back")?;
    let actual = match actual_id {
        Some(actual_id) => fetch_event(&mut *tx, user_id, actual_id).await?,
        None => None,
    };

    tx.commit().await.context("Failed to commit event creation")?;

    Ok((created, actual))
}

/// Overwrites the editable columns of an event. `recur_parent_id` is never
/// touched here. Returns `None` when the event does not belong to the user.
pub async fn update_event_in_db(
    pool: &SqlitePool,
    user_id: i64,
    event_id: i64,
    event: &NewEvent,
    now: DateTime<Utc>,
) -> Result<Option<Event>> {
    let result = sqlx::query(
        "UPDATE events SET title = ?, description = ?, date = ?, start_time = ?, end_time = ?, color = ?, category = ?, priority = ?, completed = ?, col_type = ?, recur_rule = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.date)
    .bind(&event.start_time)
    .bind(&event.end_time)
    .bind(&event.color)
    .bind(&event.category)
    .bind(event.priority)
    .bind(event.completed)
    .bind(event.col_type)
    .bind(&event.recur_rule)
    .bind(now)
    .bind(event_id)
    .bind(user_id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to update event with ID: {}", event_id))?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_event(pool, user_id, event_id).await
}

/// Applies a batch of time changes atomically and returns the rows that
/// exist for this user.
pub async fn batch_update_times_in_db(
    pool: &SqlitePool,
    user_id: i64,
    items: &[BatchTimeUpdate],
    now: DateTime<Utc>,
) -> Result<Vec<Event>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for item in items {
        sqlx::query(
            "UPDATE events SET start_time = ?, end_time = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&item.start_time)
        .bind(&item.end_time)
        .bind(now)
        .bind(item.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to reschedule event with ID: {}", item.id))?;
    }

    let mut updated = Vec::with_capacity(items.len());
    for item in items {
        if let Some(event) = fetch_event(&mut *tx, user_id, item.id).await? {
            updated.push(event);
        }
    }

    tx.commit().await.context("Failed to commit batch update")?;

    Ok(updated)
}

/// Moves an event into the trash. With `series` set on a recurring template,
/// every generated instance goes with it.
///
/// Returns the archived events, the requested one first, or `None` when the
/// event does not exist for this user.
pub async fn archive_event_in_db(
    pool: &SqlitePool,
    user_id: i64,
    event_id: i64,
    series: bool,
    now: DateTime<Utc>,
) -> Result<Option<Vec<Event>>> {
    debug!("Attempting to archive event with ID: {}", event_id);

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let Some(event) = fetch_event(&mut *tx, user_id, event_id).await? else {
        return Ok(None);
    };

    let mut targets = vec![event];
    if series && targets[0].recur_parent_id.is_none() && targets[0].recur_rule.is_some() {
        let instances = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE user_id = ? AND recur_parent_id = ? ORDER BY date",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to load recurring instances")?;
        targets.extend(instances);
    }

    for target in &targets {
        archive_one(&mut *tx, target, now).await?;
    }

    tx.commit().await.context("Failed to commit archive")?;

    info!(
        "Archived {} event(s) starting at ID: {}",
        targets.len(),
        event_id
    );
    Ok(Some(targets))
}

async fn archive_one(conn: &mut SqliteConnection, event: &Event, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "INSERT INTO deleted_events (user_id, original_id, title, description, date, start_time, end_time, color, category, priority, completed, col_type, recur_rule, recur_parent_id, deleted_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.user_id)
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.date)
    .bind(&event.start_time)
    .bind(&event.end_time)
    .bind(&event.color)
    .bind(&event.category)
    .bind(event.priority)
    .bind(event.completed)
    .bind(event.col_type)
    .bind(&event.recur_rule)
    .bind(event.recur_parent_id)
    .bind(now)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to archive event with ID: {}", event.id))?;

    sqlx::query("DELETE FROM events WHERE id = ? AND user_id = ?")
        .bind(event.id)
        .bind(event.user_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to delete event with ID: {}", event.id))?;

    Ok(())
}

/// Events of a user in the closed range, ordered by date then start time.
pub async fn list_events_in_range(
    pool: &SqlitePool,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Event>> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE user_id = ? AND date BETWEEN ? AND ? ORDER BY date ASC, start_time ASC, id ASC",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve events in range from DB")
}

pub async fn list_plan_events_on(pool: &SqlitePool, user_id: i64, date: NaiveDate) -> Result<Vec<Event>> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE user_id = ? AND date = ? AND col_type = 'plan' ORDER BY start_time ASC",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve plan events from DB")
}

/// Every event of a user, optionally restricted to one column type.
pub async fn list_all_events(
    pool: &SqlitePool,
    user_id: i64,
    col_type: Option<ColType>,
) -> Result<Vec<Event>> {
    let query = match col_type {
        Some(_) => {
            "SELECT * FROM events WHERE user_id = ? AND col_type = ? ORDER BY date ASC, start_time ASC"
        }
        None => "SELECT * FROM events WHERE user_id = ? ORDER BY date ASC, start_time ASC",
    };
    let mut query = sqlx::query_as::<_, Event>(query).bind(user_id);
    if let Some(col_type) = col_type {
        query = query.bind(col_type);
    }
    query
        .fetch_all(pool)
        .await
        .context("Failed to retrieve events from DB")
}

/// Most recent events first; the candidate list for searches.
pub async fn list_recent_events(pool: &SqlitePool, user_id: i64, limit: i64) -> Result<Vec<Event>> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE user_id = ? ORDER BY date DESC, start_time DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve search candidates from DB")
}

pub async fn event_dates_in_range(
    pool: &SqlitePool,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>> {
    sqlx::query_scalar::<_, NaiveDate>(
        "SELECT DISTINCT date FROM events WHERE user_id = ? AND date BETWEEN ? AND ? ORDER BY date ASC",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve event dates from DB")
}

/// Recurring templates whose anchor is not after `until`.
pub async fn list_recurring_templates(
    pool: &SqlitePool,
    user_id: i64,
    until: NaiveDate,
) -> std::result::Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE user_id = ? AND col_type = 'plan' AND recur_rule IS NOT NULL AND recur_parent_id IS NULL AND date <= ? ORDER BY id ASC",
    )
    .bind(user_id)
    .bind(until)
    .fetch_all(pool)
    .await
}

/// Whether the plan instance of `template_id` on `date` already exists.
pub async fn instance_exists(
    pool: &SqlitePool,
    user_id: i64,
    date: NaiveDate,
    template_id: i64,
) -> std::result::Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM events WHERE user_id = ? AND date = ? AND recur_parent_id = ? AND col_type = 'plan' LIMIT 1",
    )
    .bind(user_id)
    .bind(date)
    .bind(template_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

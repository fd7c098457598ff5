// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use planner_common::{TimerRecord, TimerRecordPayload, TimerStats};
use sqlx::SqlitePool;

/// Records of one day, newest first.
pub async fn list_timer_records_on(
    pool: &SqlitePool,
    user_id: i64,
    date: NaiveDate,
) -> Result<Vec<TimerRecord>> {
    sqlx::query_as::<_, TimerRecord>(
        "SELECT * FROM timer_records WHERE user_id = ? AND date = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve timer records from DB")
}

pub async fn list_timer_records_in_range(
    pool: &SqlitePool,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TimerRecord>> {
    sqlx::query_as::<_, TimerRecord>(
        "SELECT * FROM timer_records WHERE user_id = ? AND date BETWEEN ? AND ? ORDER BY date ASC, created_at ASC",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve timer records in range from DB")
}

pub async fn list_all_timer_records(pool: &SqlitePool, user_id: i64) -> Result<Vec<TimerRecord>> {
    sqlx::query_as::<_, TimerRecord>(
        "SELECT * FROM timer_records WHERE user_id = ? ORDER BY date ASC, created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve timer records from DB")
}

pub async fn create_timer_record_in_db(
    pool: &SqlitePool,
    user_id: i64,
    payload: &TimerRecordPayload,
    now: DateTime<Utc>,
) -> Result<TimerRecord> {
    let id = sqlx::query(
        "INSERT INTO timer_records (user_id, task_name, planned_minutes, actual_seconds, date, completed, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&payload.task_name)
    .bind(payload.planned_minutes)
    .bind(payload.actual_seconds)
    .bind(payload.date)
    .bind(payload.completed)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert timer record into DB")?
    .last_insert_rowid();

    Ok(TimerRecord {
        id,
        user_id,
        task_name: payload.task_name.clone(),
        planned_minutes: payload.planned_minutes,
        actual_seconds: payload.actual_seconds,
        date: payload.date,
        completed: payload.completed,
        created_at: now,
    })
}

pub async fn delete_timer_record_in_db(pool: &SqlitePool, user_id: i64, record_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM timer_records WHERE id = ? AND user_id = ?")
        .bind(record_id)
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete timer record with ID: {}", record_id))?;
    Ok(result.rows_affected() > 0)
}

pub async fn timer_stats_on(pool: &SqlitePool, user_id: i64, date: NaiveDate) -> Result<TimerStats> {
    let (total, completed, total_seconds) = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT COUNT(*), COALESCE(SUM(completed), 0), COALESCE(SUM(actual_seconds), 0) FROM timer_records WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(pool)
    .await
    .context("Failed to compute timer stats")?;

    Ok(TimerStats {
        total,
        completed,
        total_seconds,
    })
}

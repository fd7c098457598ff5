// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use planner_common::Note;
use sqlx::SqlitePool;
use tracing::debug;

/// Notes of one day, oldest first.
pub async fn list_notes_on(pool: &SqlitePool, user_id: i64, date: NaiveDate) -> Result<Vec<Note>> {
    sqlx::query_as::<_, Note>(
        "SELECT * FROM notes WHERE user_id = ? AND date = ? ORDER BY id ASC",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve notes from DB")
}

pub async fn fetch_note(pool: &SqlitePool, user_id: i64, note_id: i64) -> Result<Option<Note>> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ? AND user_id = ?")
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to fetch note with ID: {}", note_id))
}

pub async fn create_note_in_db(
    pool: &SqlitePool,
    user_id: i64,
    date: NaiveDate,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Note> {
    let id = sqlx::query(
        "INSERT INTO notes (user_id, date, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(date)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert note into DB")?
    .last_insert_rowid();

    Ok(Note {
        id,
        user_id,
        date,
        content: content.to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn update_note_in_db(
    pool: &SqlitePool,
    user_id: i64,
    note_id: i64,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Option<Note>> {
    let result = sqlx::query("UPDATE notes SET content = ?, updated_at = ? WHERE id = ? AND user_id = ?")
        .bind(content)
        .bind(now)
        .bind(note_id)
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update note with ID: {}", note_id))?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_note(pool, user_id, note_id).await
}

/// Writes the content of the first note of a day, creating it if needed.
pub async fn upsert_note_for_date(
    pool: &SqlitePool,
    user_id: i64,
    date: NaiveDate,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Note> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM notes WHERE user_id = ? AND date = ? ORDER BY id ASC LIMIT 1",
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .context("Failed to look up note for date")?;

    match existing {
        Some(note_id) => {
            debug!("Updating note {} for {}", note_id, date);
            update_note_in_db(pool, user_id, note_id, content, now)
                .await?
                .context("Note disappeared during upsert")
        }
        None => create_note_in_db(pool, user_id, date, content, now).await,
    }
}

pub async fn delete_note_in_db(pool: &SqlitePool, user_id: i64, note_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM notes WHERE id = ? AND user_id = ?")
        .bind(note_id)
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete note with ID: {}", note_id))?;
    Ok(result.rows_affected() > 0)
}

/// Days in the range that have at least one non-blank note.
pub async fn note_dates_in_range(
    pool: &SqlitePool,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>> {
    sqlx::query_scalar::<_, NaiveDate>(
        "SELECT DISTINCT date FROM notes WHERE user_id = ? AND date BETWEEN ? AND ? AND TRIM(content) != '' ORDER BY date ASC",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve note dates from DB")
}

pub async fn list_all_notes(pool: &SqlitePool, user_id: i64) -> Result<Vec<Note>> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE user_id = ? ORDER BY date ASC, id ASC")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to retrieve notes from DB")
}

/// Most recent non-blank notes first; the candidate list for searches.
pub async fn list_recent_notes(pool: &SqlitePool, user_id: i64, limit: i64) -> Result<Vec<Note>> {
    sqlx::query_as::<_, Note>(
        "SELECT * FROM notes WHERE user_id = ? AND TRIM(content) != '' ORDER BY date DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve note search candidates from DB")
}

pub async fn insert_note_image(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    storage_path: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO note_images (user_id, token, storage_path, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(token)
    .bind(storage_path)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to record note image")?;
    Ok(())
}

/// Storage path of an image, only if it belongs to the user.
pub async fn note_image_path(pool: &SqlitePool, user_id: i64, token: &str) -> Result<Option<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT storage_path FROM note_images WHERE token = ? AND user_id = ?",
    )
    .bind(token)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to look up note image")
}

pub async fn list_note_image_paths(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT storage_path FROM note_images WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list note images")
}

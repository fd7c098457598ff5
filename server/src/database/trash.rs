// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use planner_common::{DeletedEvent, Event};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::events::{NewEvent, fetch_event, insert_event, insert_event_with_id};

pub async fn list_trash(pool: &SqlitePool, user_id: i64) -> Result<Vec<DeletedEvent>> {
    sqlx::query_as::<_, DeletedEvent>(
        "SELECT * FROM deleted_events WHERE user_id = ? ORDER BY deleted_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve trash from DB")
}

/// Puts an archived snapshot back on the calendar and drops it from the
/// trash.
///
/// The row gets its original id back when that id is still free, so a
/// restored template and its restored instances stay linked. Otherwise the
/// row gets a new id and every live or trashed instance pointing at the old
/// id is relinked to it.
pub async fn restore_from_trash_in_db(
    pool: &SqlitePool,
    user_id: i64,
    trash_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Event>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let Some(deleted) = sqlx::query_as::<_, DeletedEvent>(
        "SELECT * FROM deleted_events WHERE id = ? AND user_id = ?",
    )
    .bind(trash_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to read trash entry")?
    else {
        return Ok(None);
    };

    let original_id = deleted.original_id;
    let restored = NewEvent {
        title: deleted.title,
        description: deleted.description,
        date: deleted.date,
        start_time: deleted.start_time,
        end_time: deleted.end_time,
        color: deleted.color,
        category: deleted.category,
        priority: deleted.priority,
        completed: deleted.completed,
        col_type: deleted.col_type,
        recur_rule: deleted.recur_rule,
        recur_parent_id: deleted.recur_parent_id,
    };

    let reusable_id = match original_id {
        Some(original) => {
            let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events WHERE id = ?")
                .bind(original)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to check original event id")?;
            (taken == 0).then_some(original)
        }
        None => None,
    };

    let id = match reusable_id {
        Some(original) => insert_event_with_id(&mut *tx, original, user_id, &restored, now).await?,
        None => insert_event(&mut *tx, user_id, &restored, now).await?,
    };

    if let Some(original) = original_id.filter(|original| *original != id) {
        for table in ["events", "deleted_events"] {
            sqlx::query(&format!(
                "UPDATE {} SET recur_parent_id = ? WHERE user_id = ? AND recur_parent_id = ?",
                table
            ))
            .bind(id)
            .bind(user_id)
            .bind(original)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to relink instances in {}", table))?;
        }
        debug!("Relinked instances of event {} to {}", original, id);
    }

    sqlx::query("DELETE FROM deleted_events WHERE id = ? AND user_id = ?")
        .bind(trash_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove restored trash entry")?;

    let event = fetch_event(&mut *tx, user_id, id).await?;
    tx.commit().await.context("Failed to commit restore")?;

    info!("Restored trash entry {} as event {}", trash_id, id);
    Ok(event)
}

pub async fn purge_trash_item_in_db(pool: &SqlitePool, user_id: i64, trash_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM deleted_events WHERE id = ? AND user_id = ?")
        .bind(trash_id)
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to purge trash entry with ID: {}", trash_id))?;
    Ok(result.rows_affected() > 0)
}

pub async fn empty_trash_in_db(pool: &SqlitePool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM deleted_events WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to empty trash")?;
    Ok(result.rows_affected())
}

/// Retention sweep: removes trash entries of every user deleted before `cutoff`.
pub async fn purge_trash_before(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM deleted_events WHERE deleted_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await
        .context("Failed to purge expired trash")?;
    Ok(result.rows_affected())
}

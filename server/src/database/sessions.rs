// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use planner_common::DeviceSession;
use sqlx::SqlitePool;
use tracing::info;

/// A row of the `sessions` table.
///
/// A session without `user_id` is anonymous; it may still carry the
/// password-reset progress of a visitor who verified an emailed code.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: i64,
    pub token: String,
    pub user_id: Option<i64>,
    pub remember: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reset_email: Option<String>,
    pub reset_verified_at: Option<DateTime<Utc>>,
}

/// Client details captured when a session is opened.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub async fn create_session(
    pool: &SqlitePool,
    token: &str,
    user_id: Option<i64>,
    remember: bool,
    client: &ClientInfo,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<SessionRecord> {
    let id = sqlx::query(
        "INSERT INTO sessions (token, user_id, remember, ip_address, user_agent, created_at, last_active, expires_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(token)
    .bind(user_id)
    .bind(remember)
    .bind(&client.ip_address)
    .bind(&client.user_agent)
    .bind(now)
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("Failed to create session")?
    .last_insert_rowid();

    Ok(SessionRecord {
        id,
        token: token.to_string(),
        user_id,
        remember,
        ip_address: client.ip_address.clone(),
        user_agent: client.user_agent.clone(),
        created_at: now,
        last_active: now,
        expires_at,
        reset_email: None,
        reset_verified_at: None,
    })
}

/// Looks up a session that has not expired yet.
pub async fn find_live_session(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<SessionRecord>> {
    sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE token = ? AND expires_at > ?")
        .bind(token)
        .bind(now)
        .fetch_optional(pool)
        .await
        .context("Failed to look up session")
}

pub async fn touch_session(pool: &SqlitePool, session_id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE sessions SET last_active = ? WHERE id = ?")
        .bind(now)
        .bind(session_id)
        .execute(pool)
        .await
        .context("Failed to refresh session activity")?;
    Ok(())
}

pub async fn set_reset_state(
    pool: &SqlitePool,
    session_id: i64,
    email: &str,
    verified_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE sessions SET reset_email = ?, reset_verified_at = ? WHERE id = ?")
        .bind(email)
        .bind(verified_at)
        .bind(session_id)
        .execute(pool)
        .await
        .context("Failed to store reset state")?;
    Ok(())
}

pub async fn clear_reset_state(pool: &SqlitePool, session_id: i64) -> Result<()> {
    sqlx::query("UPDATE sessions SET reset_email = NULL, reset_verified_at = NULL WHERE id = ?")
        .bind(session_id)
        .execute(pool)
        .await
        .context("Failed to clear reset state")?;
    Ok(())
}

pub async fn delete_session_by_token(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to delete session")?;
    Ok(())
}

/// Signed-in devices of a user, most recently active first.
pub async fn list_user_sessions(
    pool: &SqlitePool,
    user_id: i64,
    current_session_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<DeviceSession>> {
    let rows = sqlx::query_as::<_, SessionRecord>(
        "SELECT * FROM sessions WHERE user_id = ? AND expires_at > ? ORDER BY last_active DESC, id DESC",
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(pool)
    .await
    .context("Failed to list sessions")?;

    Ok(rows
        .into_iter()
        .map(|row| DeviceSession {
            id: row.id,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
            last_active: row.last_active,
            is_current: row.id == current_session_id,
        })
        .collect())
}

pub async fn revoke_session_in_db(pool: &SqlitePool, user_id: i64, session_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ? AND user_id = ?")
        .bind(session_id)
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to revoke session with ID: {}", session_id))?;
    Ok(result.rows_affected() > 0)
}

/// Signs the user out everywhere except `keep_session_id`.
pub async fn revoke_other_sessions(pool: &SqlitePool, user_id: i64, keep_session_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND id != ?")
        .bind(user_id)
        .bind(keep_session_id)
        .execute(pool)
        .await
        .context("Failed to revoke other sessions")?;
    info!("Revoked {} other sessions of user {}", result.rows_affected(), user_id);
    Ok(result.rows_affected())
}

pub async fn revoke_all_sessions(pool: &SqlitePool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to revoke sessions")?;
    Ok(result.rows_affected())
}

pub async fn purge_expired_sessions(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to purge expired sessions")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible() {
        let pool = in_memory_pool().await.unwrap();
        let client = ClientInfo::default();
        create_session(&pool, "live", Some(1), false, &client, now(), now() + Duration::hours(1))
            .await
            .unwrap();
        create_session(&pool, "dead", Some(1), false, &client, now(), now() + Duration::seconds(1))
            .await
            .unwrap();

        let later = now() + Duration::minutes(5);
        assert!(find_live_session(&pool, "live", later).await.unwrap().is_some());
        assert!(find_live_session(&pool, "dead", later).await.unwrap().is_none());

        assert_eq!(purge_expired_sessions(&pool, later).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revoke_other_sessions_keeps_current() {
        let pool = in_memory_pool().await.unwrap();
        let client = ClientInfo {
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("test".to_string()),
        };
        let expires = now() + Duration::days(1);
        let current = create_session(&pool, "a", Some(1), true, &client, now(), expires).await.unwrap();
        create_session(&pool, "b", Some(1), true, &client, now(), expires).await.unwrap();
        create_session(&pool, "c", Some(2), true, &client, now(), expires).await.unwrap();

        assert_eq!(revoke_other_sessions(&pool, 1, current.id).await.unwrap(), 1);

        let devices = list_user_sessions(&pool, 1, current.id, now()).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_current);
        assert!(find_live_session(&pool, "c", now()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reset_state_round_trip() {
        let pool = in_memory_pool().await.unwrap();
        let session = create_session(&pool, "anon", None, false, &ClientInfo::default(), now(), now() + Duration::days(1))
            .await
            .unwrap();

        set_reset_state(&pool, session.id, "a@b.co", now()).await.unwrap();
        let stored = find_live_session(&pool, "anon", now()).await.unwrap().unwrap();
        assert_eq!(stored.reset_email.as_deref(), Some("a@b.co"));
        assert_eq!(stored.reset_verified_at, Some(now()));

        clear_reset_state(&pool, session.id).await.unwrap();
        let cleared = find_live_session(&pool, "anon", now()).await.unwrap().unwrap();
        assert!(cleared.reset_email.is_none());
    }
}

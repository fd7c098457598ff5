// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use planner_common::{User, UserSettings};
use sqlx::SqlitePool;
use tracing::info;

pub const DEFAULT_DAILY_GOAL_HOURS: f64 = 8.0;

/// A user row together with its password hash, used only for sign-in and
/// password checks.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credentials {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// Creates an account. Returns `None` when the email is already taken.
pub async fn create_user_in_db(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await
        .context("Failed to check email availability")?;
    if taken > 0 {
        return Ok(None);
    }

    let id = sqlx::query(
        "INSERT INTO users (email, username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert user into DB")?
    .last_insert_rowid();

    info!("Created user {} ({})", id, email);
    get_user(pool, id).await
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to fetch user with ID: {}", user_id))
}

pub async fn find_credentials_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Credentials>> {
    sqlx::query_as::<_, Credentials>("SELECT id, email, password_hash FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user by email")
}

pub async fn find_credentials_by_id(pool: &SqlitePool, user_id: i64) -> Result<Option<Credentials>> {
    sqlx::query_as::<_, Credentials>("SELECT id, email, password_hash FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user credentials")
}

/// Records a sign-in and fills the language if the account has none yet.
pub async fn record_login(
    pool: &SqlitePool,
    user_id: i64,
    language: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET last_login = ?, language = CASE WHEN language = '' AND ? IS NOT NULL THEN ? ELSE language END WHERE id = ?",
    )
    .bind(now)
    .bind(language)
    .bind(language)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to record login")?;
    Ok(())
}

pub async fn update_profile_in_db(
    pool: &SqlitePool,
    user_id: i64,
    username: &str,
    bio: &str,
    language: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    sqlx::query("UPDATE users SET username = ?, bio = ?, language = ?, updated_at = ? WHERE id = ?")
        .bind(username)
        .bind(bio)
        .bind(language)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update profile")?;
    get_user(pool, user_id).await
}

/// Points the account at a new avatar and returns the previous one.
pub async fn set_avatar_in_db(
    pool: &SqlitePool,
    user_id: i64,
    avatar: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>> {
    let previous = sqlx::query_scalar::<_, String>("SELECT avatar FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read current avatar")?;

    sqlx::query("UPDATE users SET avatar = ?, updated_at = ? WHERE id = ?")
        .bind(avatar)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update avatar")?;

    Ok(previous.filter(|p| !p.is_empty()))
}

pub async fn set_password_hash(
    pool: &SqlitePool,
    user_id: i64,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update password")?;
    Ok(())
}

pub async fn get_settings(pool: &SqlitePool, user_id: i64) -> Result<UserSettings> {
    let stored = sqlx::query_as::<_, UserSettings>(
        "SELECT user_id, daily_goal_hours FROM user_settings WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read user settings")?;

    Ok(stored.unwrap_or(UserSettings {
        user_id,
        daily_goal_hours: DEFAULT_DAILY_GOAL_HOURS,
    }))
}

pub async fn upsert_settings(
    pool: &SqlitePool,
    user_id: i64,
    daily_goal_hours: f64,
    now: DateTime<Utc>,
) -> Result<UserSettings> {
    sqlx::query(
        "INSERT INTO user_settings (user_id, daily_goal_hours, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET daily_goal_hours = excluded.daily_goal_hours, updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(daily_goal_hours)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to save user settings")?;

    Ok(UserSettings {
        user_id,
        daily_goal_hours,
    })
}

/// Removes the account and everything it owns in one transaction.
pub async fn delete_account_in_db(pool: &SqlitePool, user_id: i64, email: &str) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for table in [
        "events",
        "deleted_events",
        "timer_records",
        "event_templates",
        "notes",
        "note_images",
        "user_settings",
        "sessions",
    ] {
        sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?", table))
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete rows of {} for user {}", table, user_id))?;
    }

    sqlx::query("DELETE FROM verification_codes WHERE email = ?")
        .bind(email)
        .execute(&mut *tx)
        .await
        .context("Failed to delete verification codes")?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete user")?;

    tx.commit().await.context("Failed to commit account deletion")?;
    info!("Deleted account {}", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_email_is_refused() {
        let pool = in_memory_pool().await.unwrap();
        assert!(create_user_in_db(&pool, "a@b.co", "ann", "hash", now()).await.unwrap().is_some());
        assert!(create_user_in_db(&pool, "a@b.co", "other", "hash", now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_fills_language_only_once() {
        let pool = in_memory_pool().await.unwrap();
        let user = create_user_in_db(&pool, "a@b.co", "ann", "hash", now()).await.unwrap().unwrap();

        record_login(&pool, user.id, Some("fr"), now()).await.unwrap();
        record_login(&pool, user.id, Some("de"), now()).await.unwrap();

        let stored = get_user(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(stored.language, "fr");
        assert_eq!(stored.last_login, Some(now()));
    }

    #[tokio::test]
    async fn test_settings_default_then_upsert() {
        let pool = in_memory_pool().await.unwrap();
        assert_eq!(get_settings(&pool, 3).await.unwrap().daily_goal_hours, 8.0);

        upsert_settings(&pool, 3, 6.5, now()).await.unwrap();
        upsert_settings(&pool, 3, 7.0, now()).await.unwrap();
        assert_eq!(get_settings(&pool, 3).await.unwrap().daily_goal_hours, 7.0);
    }

    #[tokio::test]
    async fn test_delete_account_removes_owned_rows() {
        let pool = in_memory_pool().await.unwrap();
        let user = create_user_in_db(&pool, "a@b.co", "ann", "hash", now()).await.unwrap().unwrap();
        upsert_settings(&pool, user.id, 5.0, now()).await.unwrap();
        crate::database::notes::create_note_in_db(&pool, user.id, now().date_naive(), "x", now())
            .await
            .unwrap();

        delete_account_in_db(&pool, user.id, "a@b.co").await.unwrap();

        assert!(get_user(&pool, user.id).await.unwrap().is_none());
        assert!(crate::database::notes::list_all_notes(&pool, user.id).await.unwrap().is_empty());
        assert_eq!(get_settings(&pool, user.id).await.unwrap().daily_goal_hours, 8.0);
    }
}

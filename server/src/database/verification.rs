// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

pub const KIND_RESET_PASSWORD: &str = "reset_password";

/// Stores a fresh code for `email`, invalidating every earlier unused code
/// of the same kind.
pub async fn store_code(
    pool: &SqlitePool,
    email: &str,
    code: &str,
    kind: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("UPDATE verification_codes SET used = 1 WHERE email = ? AND kind = ? AND used = 0")
        .bind(email)
        .bind(kind)
        .execute(&mut *tx)
        .await
        .context("Failed to invalidate previous codes")?;

    sqlx::query(
        "INSERT INTO verification_codes (email, code, kind, created_at, expires_at, used) VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(email)
    .bind(code)
    .bind(kind)
    .bind(now)
    .bind(expires_at)
    .execute(&mut *tx)
    .await
    .context("Failed to store verification code")?;

    tx.commit().await.context("Failed to commit verification code")?;
    debug!("Stored {} code for {}", kind, email);
    Ok(())
}

/// Consumes the newest matching code if it is unused and not expired.
/// Returns whether the code was accepted.
pub async fn consume_code(
    pool: &SqlitePool,
    email: &str,
    code: &str,
    kind: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM verification_codes WHERE email = ? AND code = ? AND kind = ? AND used = 0 AND expires_at > ? ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(email)
    .bind(code)
    .bind(kind)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to look up verification code")?;

    let Some(id) = id else {
        return Ok(false);
    };

    sqlx::query("UPDATE verification_codes SET used = 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to mark verification code as used")?;

    tx.commit().await.context("Failed to commit verification code")?;
    Ok(true)
}

/// Drops codes that expired, or were issued and used, before `cutoff`.
pub async fn purge_stale_codes(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM verification_codes WHERE expires_at < ? OR (used = 1 AND created_at < ?)",
    )
    .bind(cutoff)
    .bind(cutoff)
    .execute(pool)
    .await
    .context("Failed to purge verification codes")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let pool = in_memory_pool().await.unwrap();
        store_code(&pool, "a@b.co", "123456", KIND_RESET_PASSWORD, now(), now() + Duration::minutes(10))
            .await
            .unwrap();

        assert!(consume_code(&pool, "a@b.co", "123456", KIND_RESET_PASSWORD, now()).await.unwrap());
        assert!(!consume_code(&pool, "a@b.co", "123456", KIND_RESET_PASSWORD, now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_new_code_invalidates_previous_one() {
        let pool = in_memory_pool().await.unwrap();
        let expires = now() + Duration::minutes(10);
        store_code(&pool, "a@b.co", "111111", KIND_RESET_PASSWORD, now(), expires).await.unwrap();
        store_code(&pool, "a@b.co", "222222", KIND_RESET_PASSWORD, now(), expires).await.unwrap();

        assert!(!consume_code(&pool, "a@b.co", "111111", KIND_RESET_PASSWORD, now()).await.unwrap());
        assert!(consume_code(&pool, "a@b.co", "222222", KIND_RESET_PASSWORD, now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_and_purged() {
        let pool = in_memory_pool().await.unwrap();
        store_code(&pool, "a@b.co", "333333", KIND_RESET_PASSWORD, now(), now() + Duration::minutes(10))
            .await
            .unwrap();

        let later = now() + Duration::minutes(11);
        assert!(!consume_code(&pool, "a@b.co", "333333", KIND_RESET_PASSWORD, later).await.unwrap());
        assert_eq!(purge_stale_codes(&pool, now()).await.unwrap(), 0);
        assert_eq!(purge_stale_codes(&pool, later).await.unwrap(), 1);
    }
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Periodic housekeeping of the database.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::MaintenanceConfig;
use crate::database::{sessions, trash, verification};
use crate::state::Clock;

/// What one sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub verification_codes: u64,
    pub trash_entries: u64,
    pub sessions: u64,
}

/// Runs one sweep: stale verification codes, old trash entries and expired
/// sessions are deleted, then SQLite refreshes its planner statistics.
pub async fn run_once(pool: &SqlitePool, clock: &dyn Clock, config: &MaintenanceConfig) -> Result<SweepReport> {
    let now = clock.now();

    let verification_codes = verification::purge_stale_codes(pool, now - Duration::hours(24)).await?;
    let trash_entries = trash::purge_trash_before(pool, now - Duration::days(config.trash_retention_days)).await?;
    let sessions = sessions::purge_expired_sessions(pool, now).await?;

    sqlx::query("PRAGMA optimize")
        .execute(pool)
        .await
        .context("Failed to optimize database")?;

    Ok(SweepReport {
        verification_codes,
        trash_entries,
        sessions,
    })
}

/// Spawns the housekeeping loop on a fixed interval.
pub fn spawn(pool: SqlitePool, clock: Arc<dyn Clock>, config: MaintenanceConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(std::time::Duration::from_secs(config.interval_secs.max(1)));

        loop {
            interval.tick().await;

            match run_once(&pool, clock.as_ref(), &config).await {
                Ok(report) => tracing::info!(
                    "Maintenance sweep removed {} codes, {} trash entries, {} sessions.",
                    report.verification_codes,
                    report.trash_entries,
                    report.sessions
                ),
                Err(e) => tracing::error!("Error during maintenance sweep: {:?}", e),
            }
        }
    })
}

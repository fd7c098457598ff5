// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod events;
pub mod notes;
pub mod sessions;
pub mod templates;
pub mod timer;
pub mod trash;
pub mod users;
pub mod verification;

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        avatar TEXT NOT NULL DEFAULT '',
        bio TEXT NOT NULL DEFAULT '',
        language TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        last_login TIMESTAMP NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE,
        user_id INTEGER NULL,
        remember INTEGER NOT NULL DEFAULT 0,
        ip_address TEXT NULL,
        user_agent TEXT NULL,
        created_at TIMESTAMP NOT NULL,
        last_active TIMESTAMP NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        reset_email TEXT NULL,
        reset_verified_at TIMESTAMP NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS verification_codes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        code TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'reset_password',
        created_at TIMESTAMP NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        used INTEGER NOT NULL DEFAULT 0
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        date DATE NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        color TEXT NOT NULL,
        category TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 2,
        completed INTEGER NOT NULL DEFAULT 0,
        col_type TEXT NOT NULL DEFAULT 'plan',
        recur_rule TEXT NULL,
        recur_parent_id INTEGER NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS deleted_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        original_id INTEGER NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        date DATE NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        color TEXT NOT NULL,
        category TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 2,
        completed INTEGER NOT NULL DEFAULT 0,
        col_type TEXT NOT NULL DEFAULT 'plan',
        recur_rule TEXT NULL,
        recur_parent_id INTEGER NULL,
        deleted_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timer_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        task_name TEXT NOT NULL,
        planned_minutes INTEGER NOT NULL,
        actual_seconds INTEGER NOT NULL,
        date DATE NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        duration_minutes INTEGER NOT NULL DEFAULT 60,
        color TEXT NOT NULL,
        category TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 2,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        date DATE NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS note_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        token TEXT NOT NULL UNIQUE,
        storage_path TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_settings (
        user_id INTEGER PRIMARY KEY,
        daily_goal_hours REAL NOT NULL DEFAULT 8.0,
        updated_at TIMESTAMP NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_user_date ON events(user_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_events_recur ON events(recur_parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_col_type ON events(user_id, col_type, date)",
    "CREATE INDEX IF NOT EXISTS idx_notes_user_date ON notes(user_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_timer_user_date ON timer_records(user_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_vcode_email ON verification_codes(email, used)",
    "CREATE INDEX IF NOT EXISTS idx_templates_user ON event_templates(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_deleted_events_user ON deleted_events(user_id, deleted_at)",
    "CREATE INDEX IF NOT EXISTS idx_note_images_user ON note_images(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
];

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures every table and index exists.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Opens a private in-memory database with the full schema.
///
/// The pool is pinned to a single connection that never expires, because
/// every new SQLite `:memory:` connection would otherwise see an empty
/// database of its own.
pub async fn in_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to apply schema statement: {}", statement.trim()))?;
    }
    info!("Database schema is ready.");
    Ok(())
}

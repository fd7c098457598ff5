// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use planner_common::EventTemplate;
use sqlx::SqlitePool;

/// Column values of a preset after validation and clamping.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: i64,
    pub color: String,
    pub category: String,
    pub priority: i64,
}

pub async fn list_templates(pool: &SqlitePool, user_id: i64) -> Result<Vec<EventTemplate>> {
    sqlx::query_as::<_, EventTemplate>(
        "SELECT * FROM event_templates WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve templates from DB")
}

pub async fn count_templates(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM event_templates WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count templates")
}

pub async fn create_template_in_db(
    pool: &SqlitePool,
    user_id: i64,
    template: NewTemplate,
    now: DateTime<Utc>,
) -> Result<EventTemplate> {
    let id = sqlx::query(
        "INSERT INTO event_templates (user_id, name, title, description, duration_minutes, color, category, priority, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&template.name)
    .bind(&template.title)
    .bind(&template.description)
    .bind(template.duration_minutes)
    .bind(&template.color)
    .bind(&template.category)
    .bind(template.priority)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert template into DB")?
    .last_insert_rowid();

    Ok(EventTemplate {
        id,
        user_id,
        name: template.name,
        title: template.title,
        description: template.description,
        duration_minutes: template.duration_minutes,
        color: template.color,
        category: template.category,
        priority: template.priority,
        created_at: now,
    })
}

pub async fn delete_template_in_db(pool: &SqlitePool, user_id: i64, template_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM event_templates WHERE id = ? AND user_id = ?")
        .bind(template_id)
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete template with ID: {}", template_id))?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;
    use chrono::TimeZone;

    fn preset(name: &str) -> NewTemplate {
        NewTemplate {
            name: name.to_string(),
            title: "Deep work".to_string(),
            description: String::new(),
            duration_minutes: 90,
            color: "#00b894".to_string(),
            category: "work".to_string(),
            priority: 1,
        }
    }

    #[tokio::test]
    async fn test_templates_are_per_user() {
        let pool = in_memory_pool().await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 10, 10, 0, 0).unwrap();

        let focus = create_template_in_db(&pool, 1, preset("Focus"), now).await.unwrap();
        create_template_in_db(&pool, 1, preset("Review"), now).await.unwrap();
        create_template_in_db(&pool, 2, preset("Elsewhere"), now).await.unwrap();

        assert_eq!(count_templates(&pool, 1).await.unwrap(), 2);
        let listed = list_templates(&pool, 1).await.unwrap();
        assert_eq!(listed[0].name, "Review");
        assert_eq!(listed[1].duration_minutes, 90);

        assert!(!delete_template_in_db(&pool, 2, focus.id).await.unwrap());
        assert!(delete_template_in_db(&pool, 1, focus.id).await.unwrap());
        assert_eq!(count_templates(&pool, 1).await.unwrap(), 1);
    }
}

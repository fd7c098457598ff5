// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Expansion of recurring plan events into dated instances.
//!
//! A template is a `plan` event carrying a [`RecurRule`]. Expansion is a pure
//! date computation ([`expand`]); materialization ([`generate_recurring_in_db`])
//! inserts one instance per produced date unless one already exists.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use planner_common::{ColType, RecurRule};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::events::{NewEvent, insert_event, instance_exists, list_recurring_templates};

/// Upper bound of candidate days (or month steps) scanned per template.
pub const MAX_EXPANSION_STEPS: u32 = 366;

#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("failed to read recurring templates: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to create instance of template {template_id} on {date}: {reason}")]
    Insert {
        template_id: i64,
        date: NaiveDate,
        reason: String,
    },
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Dates strictly after `anchor` within `[start, end]` on which the rule
/// places an instance, in ascending order.
pub fn expand(rule: RecurRule, anchor: NaiveDate, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end || end <= anchor {
        return Vec::new();
    }

    match rule {
        RecurRule::Monthly => (1..=MAX_EXPANSION_STEPS)
            .map_while(|step| anchor.checked_add_months(Months::new(step)))
            .take_while(|date| *date <= end)
            .filter(|date| *date >= start)
            .collect(),
        RecurRule::Daily | RecurRule::Weekdays | RecurRule::Weekly => {
            let first = (anchor + Duration::days(1)).max(start);
            first
                .iter_days()
                .take(MAX_EXPANSION_STEPS as usize)
                .take_while(|date| *date <= end)
                .filter(|date| match rule {
                    RecurRule::Daily => true,
                    RecurRule::Weekdays => is_weekday(*date),
                    _ => date.weekday() == anchor.weekday(),
                })
                .collect()
        }
    }
}

fn instance_of(template: &planner_common::Event, date: NaiveDate) -> NewEvent {
    NewEvent {
        title: template.title.clone(),
        description: template.description.clone(),
        date,
        start_time: template.start_time.clone(),
        end_time: template.end_time.clone(),
        color: template.color.clone(),
        category: template.category.clone(),
        priority: template.priority,
        completed: false,
        col_type: ColType::Plan,
        recur_rule: None,
        recur_parent_id: Some(template.id),
    }
}

/// Materializes instances of every recurring template of the user over
/// `[start, end]`. Returns how many rows were created.
///
/// Instances are inserted one by one; a failure leaves earlier inserts in
/// place and re-running the generation skips them.
pub async fn generate_recurring_in_db(
    pool: &SqlitePool,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize, ExpansionError> {
    let templates = list_recurring_templates(pool, user_id, end).await?;
    debug!("Expanding {} recurring templates for user {}", templates.len(), user_id);

    let mut created = 0;
    for template in &templates {
        let Some(rule) = RecurRule::parse(template.recur_rule.as_deref()) else {
            debug!("Skipping template {} with unknown rule {:?}", template.id, template.recur_rule);
            continue;
        };

        for date in expand(rule, template.date, start, end) {
            if instance_exists(pool, user_id, date, template.id).await? {
                continue;
            }
            insert_event(pool, user_id, &instance_of(template, date), now)
                .await
                .map_err(|e| ExpansionError::Insert {
                    template_id: template.id,
                    date,
                    reason: format!("{:#}", e),
                })?;
            created += 1;
        }
    }

    info!("Generated {} recurring instances for user {} ({}..{})", created, user_id, start, end);
    Ok(created)
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::extract::{Json, Query, State};
use planner_common::{Analytics, DayStats, Event};

use crate::auth::CurrentUser;
use crate::database::{events, timer, users};
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::span_minutes;

use super::{DateQuery, RangeQuery};

/// Summarizes the plan rows of one day.
pub fn day_stats(plans: &[Event], daily_goal_hours: f64) -> DayStats {
    let total = plans.len() as i64;
    let completed = plans.iter().filter(|e| e.completed).count() as i64;
    let minutes: i64 = plans.iter().map(|e| span_minutes(&e.start_time, &e.end_time)).sum();
    let completion_rate = if total > 0 {
        (completed as f64 * 100.0 / total as f64).round() as i64
    } else {
        0
    };

    DayStats {
        total,
        completed,
        total_hours: (minutes as f64 / 60.0 * 10.0).round() / 10.0,
        completion_rate,
        daily_goal_hours,
    }
}

pub async fn get_stats(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<DayStats>, AppError> {
    let date = query.date.unwrap_or_else(|| state.clock.today());
    let plans = events::list_plan_events_on(&state.pool, user.user_id, date).await?;
    let settings = users::get_settings(&state.pool, user.user_id).await?;
    Ok(Json(day_stats(&plans, settings.daily_goal_hours)))
}

pub async fn get_analytics(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Analytics>, AppError> {
    let (start, end) = range.resolve(state.clock.today())?;
    let events = events::list_events_in_range(&state.pool, user.user_id, start, end).await?;
    let timer_records = timer::list_timer_records_in_range(&state.pool, user.user_id, start, end).await?;
    Ok(Json(Analytics { events, timer_records }))
}

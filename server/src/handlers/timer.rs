// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use planner_common::{TimerRecord, TimerRecordPayload, TimerStats};
use serde_json::Value;
use tracing::info;

use crate::auth::CurrentUser;
use crate::database::timer as db;
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::MAX_TITLE_LEN;

use super::{DateQuery, success};

fn check_record(payload: &mut TimerRecordPayload) -> Result<(), AppError> {
    payload.task_name = payload.task_name.trim().to_string();
    let name_len = payload.task_name.chars().count();
    if name_len == 0 || name_len > MAX_TITLE_LEN {
        return Err(AppError::bad_request(&format!(
            "Task name must be between 1 and {} characters.",
            MAX_TITLE_LEN
        )));
    }
    if !(0..=1440).contains(&payload.planned_minutes) {
        return Err(AppError::bad_request("Planned minutes must be between 0 and 1440."));
    }
    if !(0..=86_400).contains(&payload.actual_seconds) {
        return Err(AppError::bad_request("Actual seconds must be between 0 and 86400."));
    }
    Ok(())
}

pub async fn list_records(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<TimerRecord>>, AppError> {
    let date = query.date.unwrap_or_else(|| state.clock.today());
    let records = db::list_timer_records_on(&state.pool, user.user_id, date).await?;
    info!("Successfully retrieved {} timer records for {}.", records.len(), date);
    Ok(Json(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut payload): Json<TimerRecordPayload>,
) -> Result<(StatusCode, Json<TimerRecord>), AppError> {
    check_record(&mut payload)?;
    let record = db::create_timer_record_in_db(&state.pool, user.user_id, &payload, state.clock.now()).await?;
    info!("Timer record created successfully with ID: {}", record.id);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn delete_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !db::delete_timer_record_in_db(&state.pool, user.user_id, id).await? {
        return Err(AppError::not_found(&format!("Timer record with ID {} not found.", id)));
    }
    Ok(success())
}

pub async fn record_stats(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<TimerStats>, AppError> {
    let date = query.date.unwrap_or_else(|| state.clock.today());
    Ok(Json(db::timer_stats_on(&state.pool, user.user_id, date).await?))
}

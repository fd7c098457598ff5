// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::extract::{Json, Path, State};
use planner_common::{DeletedEvent, Event};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::CurrentUser;
use crate::database::trash as db;
use crate::error::AppError;
use crate::state::AppState;

use super::success;

pub async fn list_trash(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DeletedEvent>>, AppError> {
    Ok(Json(db::list_trash(&state.pool, user.user_id).await?))
}

pub async fn restore_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Event>, AppError> {
    let event = db::restore_from_trash_in_db(&state.pool, user.user_id, id, state.clock.now())
        .await?
        .ok_or_else(|| AppError::not_found(&format!("Trash entry with ID {} not found.", id)))?;
    Ok(Json(event))
}

pub async fn purge_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !db::purge_trash_item_in_db(&state.pool, user.user_id, id).await? {
        return Err(AppError::not_found(&format!("Trash entry with ID {} not found.", id)));
    }
    Ok(success())
}

pub async fn empty_trash(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Value>, AppError> {
    let removed = db::empty_trash_in_db(&state.pool, user.user_id).await?;
    info!("Emptied trash of user {} ({} entries).", user.user_id, removed);
    Ok(Json(json!({ "success": true, "removed": removed })))
}

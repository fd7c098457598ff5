// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use planner_common::{EventTemplate, EventTemplatePayload};
use serde_json::Value;
use tracing::info;

use crate::auth::CurrentUser;
use crate::database::templates::{self as db, NewTemplate};
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{
    DEFAULT_CATEGORY, DEFAULT_COLOR, MAX_CATEGORY_LEN, MAX_DESCRIPTION_LEN, clamp_priority, is_valid_color,
    truncate_chars,
};

use super::success;

pub const MAX_TEMPLATES: i64 = 50;
const MAX_NAME_LEN: usize = 50;
const MAX_TEMPLATE_TITLE_LEN: usize = 100;

/// Validates a preset; the duration and priority are clamped rather than
/// rejected.
pub fn template_from_payload(payload: EventTemplatePayload) -> Result<NewTemplate, AppError> {
    let name = payload.name.trim();
    let title = payload.title.trim();
    if name.is_empty() || title.is_empty() {
        return Err(AppError::bad_request("Template name and title cannot be empty."));
    }
    if name.chars().count() > MAX_NAME_LEN || title.chars().count() > MAX_TEMPLATE_TITLE_LEN {
        return Err(AppError::bad_request("Template name or title is too long."));
    }

    Ok(NewTemplate {
        name: name.to_string(),
        title: title.to_string(),
        description: truncate_chars(&payload.description.unwrap_or_default(), MAX_DESCRIPTION_LEN),
        duration_minutes: payload.duration_minutes.unwrap_or(60).clamp(5, 480),
        color: payload
            .color
            .filter(|c| is_valid_color(c))
            .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        category: payload
            .category
            .map(|c| truncate_chars(c.trim(), MAX_CATEGORY_LEN))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        priority: clamp_priority(payload.priority),
    })
}

pub async fn list_templates(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<EventTemplate>>, AppError> {
    Ok(Json(db::list_templates(&state.pool, user.user_id).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<EventTemplatePayload>,
) -> Result<(StatusCode, Json<EventTemplate>), AppError> {
    let template = template_from_payload(payload)?;
    if db::count_templates(&state.pool, user.user_id).await? >= MAX_TEMPLATES {
        return Err(AppError::bad_request(&format!(
            "You can keep at most {} templates.",
            MAX_TEMPLATES
        )));
    }

    let created = db::create_template_in_db(&state.pool, user.user_id, template, state.clock.now()).await?;
    info!("Template created successfully with ID: {}", created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !db::delete_template_in_db(&state.pool, user.user_id, id).await? {
        return Err(AppError::not_found(&format!("Template with ID {} not found.", id)));
    }
    Ok(success())
}

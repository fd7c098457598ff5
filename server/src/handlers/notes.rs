// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::time::Duration;

use axum::{
    extract::{Json, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::NaiveDate;
use planner_common::{Note, NoteContentPayload, NotePayload};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::auth::{CurrentUser, random_file_token};
use crate::database::notes as db;
use crate::error::AppError;
use crate::search::{build_pattern, filter_by_pattern};
use crate::state::AppState;
use crate::storage::content_type_for;
use crate::validation::MAX_NOTE_LEN;

use super::{DateQuery, RangeQuery, SearchQuery, read_image_field, success};

fn check_content(content: &str) -> Result<(), AppError> {
    if content.chars().count() > MAX_NOTE_LEN {
        return Err(AppError::bad_request(&format!(
            "Note content cannot exceed {} characters.",
            MAX_NOTE_LEN
        )));
    }
    Ok(())
}

/// Handler for listing the notes of a day.
pub async fn list_notes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    let date = query.date.unwrap_or_else(|| state.clock.today());
    let notes = db::list_notes_on(&state.pool, user.user_id, date).await?;
    debug!("Retrieved {} notes for {}", notes.len(), date);
    Ok(Json(notes))
}

/// Handler for adding a note to a day.
pub async fn create_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<NotePayload>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    check_content(&payload.content)?;
    let note = db::create_note_in_db(&state.pool, user.user_id, payload.date, &payload.content, state.clock.now()).await?;
    info!("Note created successfully with ID: {}", note.id);
    Ok((StatusCode::CREATED, Json(note)))
}

/// Handler for writing the first note of a day, creating it if needed.
pub async fn upsert_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<NotePayload>,
) -> Result<Json<Note>, AppError> {
    check_content(&payload.content)?;
    let note =
        db::upsert_note_for_date(&state.pool, user.user_id, payload.date, &payload.content, state.clock.now()).await?;
    Ok(Json(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<NoteContentPayload>,
) -> Result<Json<Note>, AppError> {
    check_content(&payload.content)?;
    let note = db::update_note_in_db(&state.pool, user.user_id, id, &payload.content, state.clock.now())
        .await?
        .ok_or_else(|| AppError::not_found(&format!("Note with ID {} not found.", id)))?;
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !db::delete_note_in_db(&state.pool, user.user_id, id).await? {
        return Err(AppError::not_found(&format!("Note with ID {} not found.", id)));
    }
    info!("Note with ID {} deleted.", id);
    Ok(success())
}

/// Handler for the days of a range that have notes.
pub async fn note_dates(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<NaiveDate>>, AppError> {
    let (start, end) = range.resolve(state.clock.today())?;
    let dates = db::note_dates_in_range(&state.pool, user.user_id, start, end).await?;
    Ok(Json(dates))
}

/// Handler for searching note contents.
pub async fn search_notes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    let pattern = build_pattern(&query.q, query.options())?;
    let candidates = db::list_recent_notes(&state.pool, user.user_id, state.config.search.max_candidates).await?;

    let found = filter_by_pattern(
        candidates,
        pattern,
        |n: &Note| vec![n.content.as_str()],
        query.limit(),
        Duration::from_millis(state.config.search.timeout_ms),
    )
    .await?;
    Ok(Json(found))
}

/// Handler for uploading an image embedded in a note.
pub async fn upload_note_image(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (ext, bytes) = read_image_field(&mut multipart, "image", state.config.storage.max_upload_bytes).await?;

    let token = random_file_token();
    let key = format!("note_images/{}.{}", token, ext);
    state.storage.save(&key, &bytes).await?;
    db::insert_note_image(&state.pool, user.user_id, &token, &key, state.clock.now()).await?;

    info!("Stored note image {} ({} bytes)", key, bytes.len());
    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": token, "url": state.storage.url(&key) })),
    ))
}

/// Handler for serving a note image to its owner.
pub async fn get_note_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let key = db::note_image_path(&state.pool, user.user_id, &token)
        .await?
        .ok_or_else(|| AppError::not_found("Image not found."))?;
    let bytes = state.storage.load(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], bytes))
}

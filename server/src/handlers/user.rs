// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, Multipart, Path, State},
    http::header,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use planner_common::{ColType, User, UserSettings};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::auth::{CurrentUser, hash_password_blocking, random_file_token, removal_cookie, verify_password_blocking};
use crate::database::{events, notes, sessions, timer, users};
use crate::error::AppError;
use crate::export::{DataExport, build_export, import_in_db, render_csv};
use crate::ical::render_calendar;
use crate::state::AppState;
use crate::storage::content_type_for;
use crate::validation::{LANGUAGES, truncate_chars, validate_password, validate_username};

use super::{read_image_field, success};

const MAX_BIO_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ProfilePayload {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsPayload {
    pub daily_goal_hours: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountPayload {
    pub password: String,
}

fn avatar_key(name: &str) -> String {
    format!("avatars/{}", name)
}

async fn load_user(state: &AppState, user_id: i64) -> Result<User, AppError> {
    users::get_user(&state.pool, user_id)
        .await?
        .ok_or_else(AppError::unauthorized)
}

/// Checks `password` against the stored hash of `user_id`.
async fn check_password(state: &AppState, user_id: i64, password: String) -> Result<bool, AppError> {
    let credentials = users::find_credentials_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    Ok(verify_password_blocking(password, credentials.password_hash).await?)
}

pub async fn get_profile(State(state): State<AppState>, user: CurrentUser) -> Result<Json<User>, AppError> {
    Ok(Json(load_user(&state, user.user_id).await?))
}

/// Missing fields keep their current value.
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ProfilePayload>,
) -> Result<Json<User>, AppError> {
    let current = load_user(&state, user.user_id).await?;

    let username = payload
        .username
        .map(|u| u.trim().to_string())
        .unwrap_or(current.username);
    validate_username(&username).map_err(AppError::bad_request)?;

    let bio = payload.bio.map(|b| b.trim().to_string()).unwrap_or(current.bio);
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(AppError::bad_request(&format!(
            "Bio cannot exceed {} characters.",
            MAX_BIO_LEN
        )));
    }

    let language = payload.language.unwrap_or(current.language);
    if !language.is_empty() && !LANGUAGES.contains(&language.as_str()) {
        return Err(AppError::bad_request("Unsupported language."));
    }

    let updated = users::update_profile_in_db(&state.pool, user.user_id, &username, &bio, &language, state.clock.now())
        .await?
        .ok_or_else(AppError::unauthorized)?;
    info!("Profile of user {} updated", user.user_id);
    Ok(Json(updated))
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let (ext, bytes) = read_image_field(&mut multipart, "avatar", state.config.storage.max_upload_bytes).await?;

    let name = format!("{}_{}.{}", user.user_id, truncate_chars(&random_file_token(), 12), ext);
    let key = avatar_key(&name);
    state.storage.save(&key, &bytes).await?;

    if let Some(previous) = users::set_avatar_in_db(&state.pool, user.user_id, &name, state.clock.now()).await? {
        if let Err(e) = state.storage.delete(&avatar_key(&previous)).await {
            warn!("Could not remove previous avatar {}: {}", previous, e);
        }
    }

    info!("Avatar of user {} replaced with {}", user.user_id, name);
    Ok(Json(json!({ "success": true, "avatar": name, "url": state.storage.url(&key) })))
}

pub async fn get_avatar(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let key = avatar_key(&name);
    let bytes = state.storage.load(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], bytes))
}

pub async fn get_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserSettings>, AppError> {
    Ok(Json(users::get_settings(&state.pool, user.user_id).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<SettingsPayload>,
) -> Result<Json<UserSettings>, AppError> {
    if !(0.5..=24.0).contains(&payload.daily_goal_hours) {
        return Err(AppError::bad_request("Daily goal must be between 0.5 and 24 hours."));
    }
    let settings =
        users::upsert_settings(&state.pool, user.user_id, payload.daily_goal_hours, state.clock.now()).await?;
    Ok(Json(settings))
}

/// Changes the password and signs out every other device.
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<Json<Value>, AppError> {
    if payload.new_password != payload.confirm_password {
        return Err(AppError::bad_request("The new passwords do not match."));
    }
    validate_password(&payload.new_password).map_err(AppError::bad_request)?;
    if !check_password(&state, user.user_id, payload.old_password).await? {
        return Err(AppError::bad_request("Current password is incorrect."));
    }

    let hash = hash_password_blocking(payload.new_password, state.config.auth.clone()).await?;
    users::set_password_hash(&state.pool, user.user_id, &hash, state.clock.now()).await?;
    sessions::revoke_other_sessions(&state.pool, user.user_id, user.session.id).await?;
    info!("Password of user {} changed", user.user_id);
    Ok(success())
}

pub async fn export_json(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse, AppError> {
    let profile = load_user(&state, user.user_id).await?;
    let all_events = events::list_all_events(&state.pool, user.user_id, None).await?;
    let records = timer::list_all_timer_records(&state.pool, user.user_id).await?;
    let all_notes = notes::list_all_notes(&state.pool, user.user_id).await?;

    let now = state.clock.now();
    let export: DataExport = build_export(profile, all_events, records, all_notes, now);
    let disposition = format!("attachment; filename=\"schedule-export-{}.json\"", now.format("%Y%m%d"));
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(export)))
}

pub async fn export_csv(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse, AppError> {
    let all_events = events::list_all_events(&state.pool, user.user_id, None).await?;
    let records = timer::list_all_timer_records(&state.pool, user.user_id).await?;
    let body = render_csv(&all_events, &records)?;

    let disposition = format!(
        "attachment; filename=\"schedule-export-{}.csv\"",
        state.clock.now().format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Logged time as an iCalendar feed.
pub async fn export_ical(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse, AppError> {
    let actual = events::list_all_events(&state.pool, user.user_id, Some(ColType::Actual)).await?;
    let body = render_calendar(&actual);
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"schedule.ics\""),
        ],
        body,
    ))
}

pub async fn import_data(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    if !payload.is_object() {
        return Err(AppError::bad_request("Import file must be a JSON object."));
    }
    let counts = import_in_db(&state.pool, user.user_id, &payload, state.clock.now()).await?;
    info!(
        "User {} imported {} events, {} timer records, {} notes",
        user.user_id, counts.events, counts.timer_records, counts.notes
    );
    Ok(Json(json!({ "success": true, "imported": counts })))
}

/// Deletes the account, its rows and its stored files.
pub async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
    jar: CookieJar,
    Json(payload): Json<DeleteAccountPayload>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    if !check_password(&state, user.user_id, payload.password).await? {
        return Err(AppError::bad_request("Password is incorrect."));
    }

    let profile = load_user(&state, user.user_id).await?;
    let mut files = notes::list_note_image_paths(&state.pool, user.user_id).await?;
    if !profile.avatar.is_empty() {
        files.push(avatar_key(&profile.avatar));
    }

    users::delete_account_in_db(&state.pool, user.user_id, &profile.email).await?;
    for key in files {
        if let Err(e) = state.storage.delete(&key).await {
            warn!("Could not remove {} of deleted user {}: {}", key, user.user_id, e);
        }
    }

    info!("Account {} deleted", user.user_id);
    Ok((jar.remove(removal_cookie(&state.config.auth)), success()))
}

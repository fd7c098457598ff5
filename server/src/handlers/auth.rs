// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Duration;
use planner_common::{DeviceSession, User};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::auth::{
    CurrentUser, MaybeSession, client_info, hash_password_blocking, new_verification_code, open_session,
    removal_cookie, verify_password_blocking,
};
use crate::database::{sessions, users, verification};
use crate::error::AppError;
use crate::mailer::dispatch_verification_code;
use crate::state::AppState;
use crate::validation::{LANGUAGES, is_valid_email, validate_password, validate_username};

use super::success;

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
    /// UI language of the client, stored if the account has none yet.
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodePayload {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordPayload {
    pub password: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, CookieJar, Json<Value>), AppError> {
    let email = normalize_email(&payload.email);
    let username = payload.username.trim().to_string();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address."));
    }
    validate_username(&username).map_err(AppError::bad_request)?;
    validate_password(&payload.password).map_err(AppError::bad_request)?;

    if users::find_credentials_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::new(StatusCode::CONFLICT, "This email is already registered."));
    }

    let hash = hash_password_blocking(payload.password, state.config.auth.clone()).await?;
    let user = users::create_user_in_db(&state.pool, &email, &username, &hash, state.clock.now())
        .await?
        .ok_or_else(|| AppError::new(StatusCode::CONFLICT, "This email is already registered."))?;

    let (_, cookie) = open_session(&state, Some(user.id), true, &client_info(&headers)).await?;
    info!("Registered user {} ({})", user.id, user.email);
    Ok((StatusCode::CREATED, jar.add(cookie), Json(json!({ "user": user }))))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let email = normalize_email(&payload.email);
    let now = state.clock.now();

    if state.login_guard.is_locked(&email, now) {
        warn!("Login for {} refused: too many failed attempts", email);
        return Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many failed attempts, please try again later.",
        ));
    }

    let credentials = users::find_credentials_by_email(&state.pool, &email).await?;
    let verified = match &credentials {
        Some(c) => verify_password_blocking(payload.password, c.password_hash.clone()).await?,
        None => false,
    };
    let Some(credentials) = credentials.filter(|_| verified) else {
        state.login_guard.record_failure(&email, now);
        debug!("Failed login for {}", email);
        return Err(AppError::new(StatusCode::UNAUTHORIZED, "Invalid email or password."));
    };
    state.login_guard.clear(&email);

    let language = payload
        .language
        .as_deref()
        .filter(|lang| LANGUAGES.contains(lang));
    users::record_login(&state.pool, credentials.id, language, now).await?;

    let user = users::get_user(&state.pool, credentials.id)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    let (_, cookie) = open_session(&state, Some(user.id), payload.remember, &client_info(&headers)).await?;
    info!("User {} signed in", user.id);
    Ok((jar.add(cookie), Json(json!({ "user": user }))))
}

pub async fn logout(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), AppError> {
    if let Some(session) = session {
        sessions::delete_session_by_token(&state.pool, &session.token).await?;
        debug!("Session {} closed", session.id);
    }
    Ok((jar.remove(removal_cookie(&state.config.auth)), success()))
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<User>, AppError> {
    let user = users::get_user(&state.pool, user.user_id)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    Ok(Json(user))
}

/// Answers the same way whether or not the email belongs to an account.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> Result<Json<Value>, AppError> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address."));
    }

    if users::find_credentials_by_email(&state.pool, &email).await?.is_some() {
        let now = state.clock.now();
        let code = new_verification_code();
        let expires_at = now + Duration::seconds(state.config.auth.verification_code_expiry_secs);
        verification::store_code(
            &state.pool,
            &email,
            &code,
            verification::KIND_RESET_PASSWORD,
            now,
            expires_at,
        )
        .await?;
        dispatch_verification_code(state.mailer.clone(), email.clone(), code);
        info!("Password reset code issued for {}", email);
    } else {
        debug!("Password reset requested for unknown email {}", email);
    }
    Ok(success())
}

pub async fn verify_code(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<VerifyCodePayload>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let email = normalize_email(&payload.email);
    let now = state.clock.now();
    let accepted = verification::consume_code(
        &state.pool,
        &email,
        payload.code.trim(),
        verification::KIND_RESET_PASSWORD,
        now,
    )
    .await?;
    if !accepted {
        return Err(AppError::bad_request("Invalid or expired verification code."));
    }

    let jar = match session {
        Some(session) => {
            sessions::set_reset_state(&state.pool, session.id, &email, now).await?;
            jar
        }
        None => {
            let (session, cookie) = open_session(&state, None, false, &client_info(&headers)).await?;
            sessions::set_reset_state(&state.pool, session.id, &email, now).await?;
            jar.add(cookie)
        }
    };
    info!("Verification code accepted for {}", email);
    Ok((jar, success()))
}

pub async fn reset_password(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<Json<Value>, AppError> {
    let now = state.clock.now();
    let max_age = Duration::seconds(state.config.auth.reset_session_expiry_secs);
    let Some(session) = session else {
        return Err(AppError::bad_request("Please verify your email first."));
    };
    let Some(reset) = session.reset.clone().filter(|r| r.is_fresh(now, max_age)) else {
        return Err(AppError::bad_request("Verification expired, please request a new code."));
    };
    validate_password(&payload.password).map_err(AppError::bad_request)?;

    let credentials = users::find_credentials_by_email(&state.pool, &reset.email)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found."))?;
    let hash = hash_password_blocking(payload.password, state.config.auth.clone()).await?;
    users::set_password_hash(&state.pool, credentials.id, &hash, now).await?;
    sessions::clear_reset_state(&state.pool, session.id).await?;

    let revoked = if session.user_id == Some(credentials.id) {
        sessions::revoke_other_sessions(&state.pool, credentials.id, session.id).await?
    } else {
        sessions::revoke_all_sessions(&state.pool, credentials.id).await?
    };
    state.login_guard.clear(&reset.email);
    info!("Password reset for user {} ({} sessions revoked)", credentials.id, revoked);
    Ok(success())
}

pub async fn list_sessions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DeviceSession>>, AppError> {
    let devices =
        sessions::list_user_sessions(&state.pool, user.user_id, user.session.id, state.clock.now()).await?;
    Ok(Json(devices))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !sessions::revoke_session_in_db(&state.pool, user.user_id, id).await? {
        return Err(AppError::not_found(&format!("Session with ID {} not found.", id)));
    }
    Ok(success())
}

pub async fn revoke_other_sessions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let revoked = sessions::revoke_other_sessions(&state.pool, user.user_id, user.session.id).await?;
    info!("User {} revoked {} other sessions", user.user_id, revoked);
    Ok(Json(json!({ "success": true, "revoked": revoked })))
}

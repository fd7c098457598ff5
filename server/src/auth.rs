// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Password hashing, cookie sessions and the login-failure table.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::distributions::{Alphanumeric, DistString};
use rand::{Rng, RngCore};
use tracing::debug;

use crate::config::AuthConfig;
use crate::database::sessions::{self, ClientInfo, SessionRecord};
use crate::error::AppError;
use crate::state::AppState;

const SESSION_TOKEN_LEN: usize = 48;

// --- Passwords ---

pub fn hash_password(password: &str, config: &AuthConfig) -> Result<String> {
    let params = Params::new(config.argon2_memory_kib, config.argon2_iterations, 1, None)
        .map_err(|e| anyhow!("invalid Argon2id parameters: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!("failed to encode salt: {e}"))?;

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC string. Parameters are read from
/// the hash itself.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            debug!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Hashing is CPU-bound; keep it off the async workers.
pub async fn hash_password_blocking(password: String, config: AuthConfig) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .context("Password hashing task failed")?
}

pub async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .context("Password verification task failed")
}

// --- Random values ---

pub fn new_session_token() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), SESSION_TOKEN_LEN)
}

/// Six decimal digits, zero padded.
pub fn new_verification_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn random_file_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// --- Login lockout ---

/// Counts failed logins per email inside a sliding lockout window.
pub struct LoginGuard {
    max_attempts: u32,
    window: Duration,
    failures: Mutex<HashMap<String, (u32, DateTime<Utc>)>>,
}

impl LoginGuard {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_locked(&self, email: &str, now: DateTime<Utc>) -> bool {
        let failures = self.failures.lock();
        match failures.get(email) {
            Some((count, since)) => *count >= self.max_attempts && now - *since < self.window,
            None => false,
        }
    }

    pub fn record_failure(&self, email: &str, now: DateTime<Utc>) {
        self.prune(now);
        let mut failures = self.failures.lock();
        let entry = failures.entry(email.to_string()).or_insert((0, now));
        if now - entry.1 >= self.window {
            *entry = (0, now);
        }
        entry.0 += 1;
    }

    pub fn clear(&self, email: &str) {
        self.failures.lock().remove(email);
    }

    /// Drops every counter whose window has elapsed.
    pub fn prune(&self, now: DateTime<Utc>) {
        let window = self.window;
        self.failures.lock().retain(|_, (_, since)| now - *since < window);
    }
}

// --- Sessions ---

/// Password-reset progress attached to a session after a code was verified.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetState {
    pub email: String,
    pub verified_at: DateTime<Utc>,
}

impl ResetState {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.verified_at < max_age
    }
}

/// A live session resolved from the request cookie.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: i64,
    pub token: String,
    pub user_id: Option<i64>,
    pub remember: bool,
    pub expires_at: DateTime<Utc>,
    pub reset: Option<ResetState>,
}

impl SessionState {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl From<SessionRecord> for SessionState {
    fn from(record: SessionRecord) -> Self {
        let reset = match (record.reset_email, record.reset_verified_at) {
            (Some(email), Some(verified_at)) => Some(ResetState { email, verified_at }),
            _ => None,
        };
        Self {
            id: record.id,
            token: record.token,
            user_id: record.user_id,
            remember: record.remember,
            expires_at: record.expires_at,
            reset,
        }
    }
}

pub fn session_lifetime(config: &AuthConfig, remember: bool) -> Duration {
    if remember {
        Duration::days(config.remember_days)
    } else {
        Duration::hours(config.session_hours)
    }
}

/// Builds the session cookie. Remembered sessions get a `Max-Age`, others
/// end with the browser session.
pub fn session_cookie(config: &AuthConfig, token: &str, remember: bool) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies);
    if remember {
        let lifetime = session_lifetime(config, true).num_seconds();
        builder = builder.max_age(time::Duration::seconds(lifetime));
    }
    builder.build()
}

pub fn removal_cookie(config: &AuthConfig) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), "");
    cookie.set_path("/");
    cookie
}

pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let ip_address = header("x-forwarded-for")
        .and_then(|list| list.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header("x-real-ip"));
    ClientInfo {
        ip_address,
        user_agent: header("user-agent").map(|ua| ua.chars().take(500).collect()),
    }
}

/// Resolves the session behind the request cookie, refreshing its activity
/// timestamp.
pub async fn load_session(state: &AppState, jar: &CookieJar) -> Result<Option<SessionState>> {
    let Some(cookie) = jar.get(&state.config.auth.cookie_name) else {
        return Ok(None);
    };
    let now = state.clock.now();
    let Some(record) = sessions::find_live_session(&state.pool, cookie.value(), now).await? else {
        return Ok(None);
    };
    sessions::touch_session(&state.pool, record.id, now).await?;
    Ok(Some(record.into()))
}

/// Opens a new session row and returns it with its cookie.
pub async fn open_session(
    state: &AppState,
    user_id: Option<i64>,
    remember: bool,
    client: &ClientInfo,
) -> Result<(SessionState, Cookie<'static>)> {
    let now = state.clock.now();
    let token = new_session_token();
    let expires_at = now + session_lifetime(&state.config.auth, remember);
    let record = sessions::create_session(&state.pool, &token, user_id, remember, client, now, expires_at).await?;
    let cookie = session_cookie(&state.config.auth, &token, remember);
    Ok((record.into(), cookie))
}

/// The signed-in user of a request. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub session: SessionState,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session = load_session(state, &jar).await?.ok_or_else(AppError::unauthorized)?;
        if session.is_expired(state.clock.now()) {
            return Err(AppError::unauthorized());
        }
        let user_id = session.user_id.ok_or_else(AppError::unauthorized)?;
        Ok(Self { user_id, session })
    }
}

/// The session of a request whether or not anyone is signed in.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<SessionState>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self(load_session(state, &jar).await?))
    }
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::handlers::{auth, events, notes, stats, templates, timer, trash, user};
use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderName,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.storage.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
        ])
        .allow_origin(Any);

    Router::new()
        // Account and sessions
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/verify-code", post(auth::verify_code))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/sessions", get(auth::list_sessions))
        .route("/api/auth/sessions/all-others", delete(auth::revoke_other_sessions))
        .route("/api/auth/sessions/{id}", delete(auth::revoke_session))
        // Calendar events
        .route("/api/events", get(events::list_events).post(events::create_event))
        .route("/api/events/batch", put(events::batch_update_events))
        .route("/api/events/dates", get(events::event_dates))
        .route("/api/events/search", get(events::search_events))
        .route("/api/events/generate-recurring", post(events::generate_recurring))
        .route("/api/events/{id}", put(events::update_event).delete(events::delete_event))
        // Notes
        .route(
            "/api/notes",
            get(notes::list_notes).post(notes::create_note).put(notes::upsert_note),
        )
        .route("/api/notes/dates", get(notes::note_dates))
        .route("/api/notes/search", get(notes::search_notes))
        .route("/api/notes/images", post(notes::upload_note_image))
        .route("/api/notes/images/{token}", get(notes::get_note_image))
        .route("/api/notes/{id}", put(notes::update_note).delete(notes::delete_note))
        // Focus timer
        .route("/api/timer/records", get(timer::list_records).post(timer::create_record))
        .route("/api/timer/records/{id}", delete(timer::delete_record))
        .route("/api/timer/stats", get(timer::record_stats))
        // Statistics
        .route("/api/stats", get(stats::get_stats))
        .route("/api/analytics", get(stats::get_analytics))
        // Event presets
        .route("/api/templates", get(templates::list_templates).post(templates::create_template))
        .route("/api/templates/{id}", delete(templates::delete_template))
        // Trash
        .route("/api/trash", get(trash::list_trash).delete(trash::empty_trash))
        .route("/api/trash/{id}", delete(trash::purge_item))
        .route("/api/trash/{id}/restore", post(trash::restore_event))
        // Profile, settings and data
        .route("/api/user/profile", get(user::get_profile).put(user::update_profile))
        .route("/api/user/avatar", post(user::upload_avatar))
        .route("/api/user/avatar/{name}", get(user::get_avatar))
        .route("/api/user/settings", get(user::get_settings).put(user::update_settings))
        .route("/api/user/change-password", post(user::change_password))
        .route("/api/user/export", get(user::export_json))
        .route("/api/user/export/csv", get(user::export_csv))
        .route("/api/user/export/ical", get(user::export_ical))
        .route("/api/user/import", post(user::import_data))
        .route("/api/user/delete-account", post(user::delete_account))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

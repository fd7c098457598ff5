// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::time::Duration;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use planner_common::{BatchTimeUpdate, ColType, CreateEventResponse, DateRange, Event, EventPayload, RecurRule};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::auth::CurrentUser;
use crate::database::events::{self as db, NewEvent};
use crate::error::AppError;
use crate::recurrence::generate_recurring_in_db;
use crate::search::{build_pattern, filter_by_pattern};
use crate::state::AppState;
use crate::validation::{
    DEFAULT_CATEGORY, DEFAULT_COLOR, DEFAULT_PRIORITY, MAX_CATEGORY_LEN, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN,
    is_truthy, is_valid_color, validate_range, validate_time_span,
};

use super::{RangeQuery, SearchQuery};

/// Turns a request body into column values, rejecting anything invalid.
/// Unknown recurrence rules are dropped.
pub fn event_from_payload(payload: EventPayload) -> Result<NewEvent, AppError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title cannot be empty."));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request(&format!(
            "Title cannot exceed {} characters.",
            MAX_TITLE_LEN
        )));
    }

    let description = payload.description.unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::bad_request(&format!(
            "Description cannot exceed {} characters.",
            MAX_DESCRIPTION_LEN
        )));
    }

    validate_time_span(&payload.start_time, &payload.end_time).map_err(AppError::bad_request)?;

    let color = match payload.color {
        Some(color) if is_valid_color(&color) => color,
        Some(_) => return Err(AppError::bad_request("Color must use the #rrggbb format.")),
        None => DEFAULT_COLOR.to_string(),
    };

    let priority = payload.priority.unwrap_or(DEFAULT_PRIORITY);
    if !(1..=3).contains(&priority) {
        return Err(AppError::bad_request("Priority must be 1, 2 or 3."));
    }

    let category = payload
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(AppError::bad_request(&format!(
            "Category cannot exceed {} characters.",
            MAX_CATEGORY_LEN
        )));
    }

    let col_type = payload.col_type.unwrap_or_default();
    let recur_rule = RecurRule::parse(payload.recur_rule.as_deref());
    if recur_rule.is_some() && col_type == ColType::Actual {
        return Err(AppError::bad_request("Only plan events can recur."));
    }

    Ok(NewEvent {
        title: title.to_string(),
        description,
        date: payload.date,
        start_time: payload.start_time,
        end_time: payload.end_time,
        color,
        category,
        priority,
        completed: payload.completed.unwrap_or(false),
        col_type,
        recur_rule: recur_rule.map(|rule| rule.as_str().to_string()),
        recur_parent_id: None,
    })
}

/// Handler for listing the events of a date range.
pub async fn list_events(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let (start, end) = range.resolve(state.clock.today())?;
    let events = db::list_events_in_range(&state.pool, user.user_id, start, end).await?;
    info!("Successfully retrieved {} events ({}..{}).", events.len(), start, end);
    Ok(Json(events))
}

/// Handler for creating an event, optionally with its actual copy.
pub async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<EventPayload>,
) -> Result<(StatusCode, Json<CreateEventResponse>), AppError> {
    let with_actual = payload.with_actual.unwrap_or(false);
    let event = event_from_payload(payload)?;
    debug!("Received request to create event '{}' on {}", event.title, event.date);

    let (event, actual) =
        db::create_event_in_db(&state.pool, user.user_id, event, with_actual, state.clock.now()).await?;
    info!("Event created successfully with ID: {}", event.id);
    Ok((StatusCode::CREATED, Json(CreateEventResponse { event, actual })))
}

/// Handler for replacing the editable fields of an event.
pub async fn update_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<EventPayload>,
) -> Result<Json<Event>, AppError> {
    let event = event_from_payload(payload)?;

    let existing = db::fetch_event(&state.pool, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(&format!("Event with ID {} not found.", id)))?;
    if event.recur_rule.is_some() && existing.recur_parent_id.is_some() {
        return Err(AppError::bad_request(
            "An occurrence of a recurring event cannot carry its own rule.",
        ));
    }

    let updated = db::update_event_in_db(&state.pool, user.user_id, id, &event, state.clock.now())
        .await?
        .ok_or_else(|| AppError::not_found(&format!("Event with ID {} not found.", id)))?;
    info!("Event with ID {} updated.", id);
    Ok(Json(updated))
}

/// Handler for moving or resizing several events at once (drag and drop).
pub async fn batch_update_events(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(items): Json<Vec<BatchTimeUpdate>>,
) -> Result<Json<Vec<Event>>, AppError> {
    if items.is_empty() {
        return Err(AppError::bad_request("No events to update."));
    }
    for item in &items {
        validate_time_span(&item.start_time, &item.end_time).map_err(AppError::bad_request)?;
    }

    let updated = db::batch_update_times_in_db(&state.pool, user.user_id, &items, state.clock.now()).await?;
    info!("Batch updated {} events.", updated.len());
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub series: Option<String>,
}

/// Handler for moving an event (or a whole recurring series) to the trash.
pub async fn delete_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    let series = is_truthy(query.series.as_deref());
    debug!("Attempting to delete event {} (series: {})", id, series);

    let archived = db::archive_event_in_db(&state.pool, user.user_id, id, series, state.clock.now())
        .await?
        .ok_or_else(|| AppError::not_found(&format!("Event with ID {} not found.", id)))?;
    info!("Moved {} events to the trash.", archived.len());
    Ok(Json(json!({ "success": true, "archived": archived.len() })))
}

/// Handler for the days of a range that have events, for calendar dots.
pub async fn event_dates(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<NaiveDate>>, AppError> {
    let (start, end) = range.resolve(state.clock.today())?;
    let dates = db::event_dates_in_range(&state.pool, user.user_id, start, end).await?;
    Ok(Json(dates))
}

/// Handler for searching events by title, description and category.
pub async fn search_events(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let pattern = build_pattern(&query.q, query.options())?;
    let candidates = db::list_recent_events(&state.pool, user.user_id, state.config.search.max_candidates).await?;
    debug!("Searching {} events for {:?}", candidates.len(), query.q);

    let found = filter_by_pattern(
        candidates,
        pattern,
        |e: &Event| vec![e.title.as_str(), e.description.as_str(), e.category.as_str()],
        query.limit(),
        Duration::from_millis(state.config.search.timeout_ms),
    )
    .await?;
    Ok(Json(found))
}

/// Handler for materializing recurring events over a range.
pub async fn generate_recurring(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(range): Json<DateRange>,
) -> Result<Json<Value>, AppError> {
    validate_range(range.start, range.end).map_err(|msg| AppError::bad_request(&msg))?;
    let created =
        generate_recurring_in_db(&state.pool, user.user_id, range.start, range.end, state.clock.now()).await?;
    Ok(Json(json!({ "created": created })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> EventPayload {
        serde_json::from_value(json!({
            "title": "  Plan sprint ",
            "date": "2024-03-04",
            "start_time": "09:00",
            "end_time": "10:30"
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_are_applied() {
        let event = event_from_payload(payload()).unwrap();
        assert_eq!(event.title, "Plan sprint");
        assert_eq!(event.color, DEFAULT_COLOR);
        assert_eq!(event.category, DEFAULT_CATEGORY);
        assert_eq!(event.priority, DEFAULT_PRIORITY);
        assert_eq!(event.col_type, ColType::Plan);
        assert!(event.recur_rule.is_none());
    }

    #[test]
    fn test_unknown_rule_is_dropped() {
        let mut p = payload();
        p.recur_rule = Some("fortnightly".to_string());
        assert!(event_from_payload(p).unwrap().recur_rule.is_none());

        let mut p = payload();
        p.recur_rule = Some("weekly".to_string());
        assert_eq!(event_from_payload(p).unwrap().recur_rule.as_deref(), Some("weekly"));
    }

    #[test]
    fn test_actual_rows_cannot_recur() {
        let mut p = payload();
        p.col_type = Some(ColType::Actual);
        p.recur_rule = Some("daily".to_string());
        assert_eq!(event_from_payload(p).unwrap_err().code, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let mut p = payload();
        p.end_time = "08:00".to_string();
        assert!(event_from_payload(p).is_err());

        let mut p = payload();
        p.color = Some("purple".to_string());
        assert!(event_from_payload(p).is_err());

        let mut p = payload();
        p.priority = Some(4);
        assert!(event_from_payload(p).is_err());

        let mut p = payload();
        p.title = "x".repeat(201);
        assert!(event_from_payload(p).is_err());
    }
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod auth;
pub mod events;
pub mod notes;
pub mod stats;
pub mod templates;
pub mod timer;
pub mod trash;
pub mod user;

use axum::Json;
use axum::body::Bytes;
use axum::extract::Multipart;
use chrono::{NaiveDate, Weekday};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::search::{SearchOptions, clamp_limit};
use crate::storage::image_extension;
use crate::validation::{is_truthy, validate_range};

/// `?start=YYYY-MM-DD&end=YYYY-MM-DD`
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl RangeQuery {
    /// Missing bounds default to the Monday-to-Sunday week around `today`.
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), AppError> {
        let week = today.week(Weekday::Mon);
        let start = self.start.unwrap_or_else(|| week.first_day());
        let end = self.end.unwrap_or_else(|| week.last_day());
        validate_range(start, end).map_err(|msg| AppError::bad_request(&msg))?;
        Ok((start, end))
    }
}

/// `?date=YYYY-MM-DD`, defaulting to today.
#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

/// Query string of the search endpoints. Flags arrive as `"1"`/`"true"`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    pub case_sensitive: Option<String>,
    pub whole_word: Option<String>,
    pub regex: Option<String>,
}

impl SearchQuery {
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            case_sensitive: is_truthy(self.case_sensitive.as_deref()),
            whole_word: is_truthy(self.whole_word.as_deref()),
            regex: is_truthy(self.regex.as_deref()),
        }
    }

    pub fn limit(&self) -> usize {
        clamp_limit(self.limit)
    }
}

pub fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Reads the image part named `field_name` of a multipart upload. Returns the
/// lowercased file extension and the bytes.
pub async fn read_image_field(
    multipart: &mut Multipart,
    field_name: &str,
    max_bytes: usize,
) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let ext = field
            .file_name()
            .and_then(image_extension)
            .ok_or_else(|| AppError::bad_request("Only png, jpg, jpeg, gif and webp images are accepted."))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(&format!("Malformed upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(AppError::bad_request("The uploaded file is empty."));
        }
        if bytes.len() > max_bytes {
            return Err(AppError::bad_request("The uploaded file is too large."));
        }
        return Ok((ext, bytes));
    }
    Err(AppError::bad_request(&format!("Missing '{}' file.", field_name)))
}

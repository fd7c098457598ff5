// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

// --- Custom Error Handling ---
// Internal errors (database, storage, search workers) are turned into
// HTTP responses with a JSON `{ "error": ... }` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::recurrence::ExpansionError;
use crate::search::SearchError;
use crate::storage::StorageError;

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    pub code: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not signed in.")
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred.",
        )
    }
}

/// Allows converting an `anyhow::Error` (coming from the database layer)
/// into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self::internal()
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidPattern(_) | SearchError::TimedOut(_) => {
                Self::bad_request(&err.to_string())
            }
            SearchError::WorkerFailed(ref reason) => {
                tracing::error!("Search worker failed: {}", reason);
                Self::internal()
            }
        }
    }
}

impl From<ExpansionError> for AppError {
    fn from(err: ExpansionError) -> Self {
        tracing::error!("Recurring expansion failed: {:?}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => Self::not_found("File not found."),
            StorageError::InvalidPath(_) => Self::bad_request("Invalid file name."),
            StorageError::Io(_) => {
                tracing::error!("Storage error: {:?}", err);
                Self::internal()
            }
        }
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.code.is_server_error() {
            tracing::error!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        } else {
            tracing::debug!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        }
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

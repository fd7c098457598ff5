// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod handlers;
pub mod ical;
pub mod mailer;
pub mod maintenance;
pub mod recurrence;
pub mod routes;
pub mod search;
pub mod state;
pub mod storage;
pub mod validation;

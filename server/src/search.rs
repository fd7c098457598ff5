// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Pattern search with a wall-clock cap.
//!
//! The scan runs on a blocking worker. When the cap elapses the caller stops
//! waiting, raises a stop flag that the worker checks between candidates, and
//! lets the worker finish on its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_LIMIT: usize = 15;
pub const MAX_LIMIT: usize = 50;
const MAX_QUERY_LEN: usize = 200;
const REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),
    #[error("Search timed out after {0:?}, simplify your pattern.")]
    TimedOut(Duration),
    #[error("Search worker failed: {0}")]
    WorkerFailed(String),
}

/// How the query text is turned into a pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub regex: bool,
}

/// Compiles the user query. Plain queries are matched literally.
pub fn build_pattern(query: &str, options: SearchOptions) -> Result<Regex, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::InvalidPattern("query is empty".to_string()));
    }
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(SearchError::InvalidPattern(format!(
            "query is longer than {} characters",
            MAX_QUERY_LEN
        )));
    }

    let body = if options.regex {
        query.to_string()
    } else {
        regex::escape(query)
    };
    let pattern = if options.whole_word {
        format!(r"\b(?:{})\b", body)
    } else {
        body
    };

    RegexBuilder::new(&pattern)
        .case_insensitive(!options.case_sensitive)
        .size_limit(REGEX_SIZE_LIMIT)
        .dfa_size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| SearchError::InvalidPattern(e.to_string()))
}

/// Keeps the items accepted by `predicate`, in input order, stopping once
/// `limit` items matched. Fails with [`SearchError::TimedOut`] if the scan
/// does not finish within `timeout`.
pub async fn bounded_filter<T, F>(
    items: Vec<T>,
    predicate: F,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<T>, SearchError>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);

    let worker = tokio::task::spawn_blocking(move || {
        let mut matched = Vec::new();
        for item in items {
            if worker_stop.load(Ordering::Relaxed) {
                debug!("Search worker stopped early");
                break;
            }
            if predicate(&item) {
                matched.push(item);
                if matched.len() >= limit {
                    break;
                }
            }
        }
        matched
    });

    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(matched)) => Ok(matched),
        Ok(Err(join_error)) => Err(SearchError::WorkerFailed(join_error.to_string())),
        Err(_) => {
            stop.store(true, Ordering::Relaxed);
            warn!("Search exceeded {:?}, worker detached", timeout);
            Err(SearchError::TimedOut(timeout))
        }
    }
}

/// Filters records on any of the text fields returned by `fields`.
pub async fn filter_by_pattern<T, F>(
    items: Vec<T>,
    pattern: Regex,
    fields: F,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<T>, SearchError>
where
    T: Send + 'static,
    F: Fn(&T) -> Vec<&str> + Send + 'static,
{
    bounded_filter(
        items,
        move |item| fields(item).into_iter().any(|text| pattern.is_match(text)),
        limit,
        timeout,
    )
    .await
}

/// Clamps the requested result count to `1..=MAX_LIMIT`.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

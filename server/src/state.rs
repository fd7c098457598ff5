// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use sqlx::SqlitePool;

use crate::auth::LoginGuard;
use crate::config::Config;
use crate::mailer::Mailer;
use crate::storage::Storage;

/// Source of the current time. Injected so expiry windows, default ranges
/// and retention cutoffs can be tested against a fixed instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.0.lock();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Everything a request handler may need, cloned into each handler by axum.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub storage: Arc<dyn Storage>,
    pub mailer: Arc<dyn Mailer>,
    pub login_guard: Arc<LoginGuard>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: Config,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn Storage>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let login_guard = Arc::new(LoginGuard::new(
            config.auth.max_login_attempts,
            chrono::Duration::seconds(config.auth.lockout_seconds),
        ));
        Self {
            pool,
            config: Arc::new(config),
            clock,
            storage,
            mailer,
            login_guard,
        }
    }
}

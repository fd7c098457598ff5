// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use planner_server::config::load_config;
use planner_server::state::{AppState, SystemClock};
use planner_server::storage::LocalStorage;
use planner_server::{database, mailer, maintenance, routes};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting up the server...");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match database::establish_connection_pool(&config.server.database_url).await {
        Ok(pool) => {
            tracing::info!("Database connection was made successfully.");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect with the database: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&config.storage.upload_dir).await {
        tracing::error!(
            "Failed to create upload directory {}: {}",
            config.storage.upload_dir.display(),
            e
        );
        std::process::exit(1);
    }

    let mailer = match mailer::mailer_from_config(&config.mail) {
        Ok(mailer) => mailer,
        Err(e) => {
            tracing::error!("Failed to set up the mailer: {}", e);
            std::process::exit(1);
        }
    };

    let clock = Arc::new(SystemClock);
    let storage = Arc::new(LocalStorage::new(config.storage.upload_dir.clone()));
    let bind_addr = config.server.bind_addr.clone();

    maintenance::spawn(db_pool.clone(), clock.clone(), config.maintenance.clone());

    let state = AppState::new(db_pool, config, clock, storage, mailer);
    let app = routes::create_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("The server listens on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Layered configuration.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `planner.toml` in the working directory
//! 3. `PLANNER_*` environment variables, `__` separating sections
//!    (e.g. `PLANNER_MAIL__USERNAME`, `PLANNER_SERVER__BIND_ADDR`)

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: "sqlite://database/planner.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    /// Lifetime of a "remember me" session.
    pub remember_days: i64,
    /// Lifetime of a session opened without "remember me".
    pub session_hours: i64,
    pub max_login_attempts: u32,
    pub lockout_seconds: i64,
    pub verification_code_expiry_secs: i64,
    pub reset_session_expiry_secs: i64,
    /// Argon2 memory cost in KiB.
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sp_session".to_string(),
            remember_days: 30,
            session_hours: 24,
            max_login_attempts: 10,
            lockout_seconds: 900,
            verification_code_expiry_secs: 600,
            reset_session_expiry_secs: 600,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            secure_cookies: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub use_tls: bool,
}

impl MailConfig {
    /// Without credentials the server runs in development mode and only logs codes.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            sender: "noreply@schedule-planner.com".to_string(),
            use_tls: true,
        }
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("sender", &self.sender)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub timeout_ms: u64,
    /// Upper bound on rows handed to the pattern filter per search.
    pub max_candidates: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            max_candidates: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub interval_secs: u64,
    pub trash_retention_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            trash_retention_days: 30,
        }
    }
}

/// Loads the configuration from defaults, `planner.toml` and the environment.
pub fn load_config() -> Result<Config, figment::Error> {
    build_figment(Toml::file("planner.toml")).extract()
}

/// Loads the configuration from a TOML string on top of the defaults, without
/// looking at the environment.
pub fn load_config_from_str(toml_content: &str) -> Result<Config, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

fn build_figment(file: figment::providers::Data<Toml>) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(file)
        .merge(Env::prefixed("PLANNER_").split("__"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.auth.max_login_attempts, 10);
        assert_eq!(config.auth.lockout_seconds, 900);
        assert_eq!(config.search.timeout_ms, 3000);
        assert_eq!(config.maintenance.trash_retention_days, 30);
        assert_eq!(config.storage.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_toml_overrides_single_fields() {
        let config = load_config_from_str(
            r#"
            [server]
            bind_addr = "127.0.0.1:8080"

            [search]
            timeout_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.search.timeout_ms, 500);
        // Untouched fields keep their defaults.
        assert_eq!(config.server.database_url, "sqlite://database/planner.db");
        assert_eq!(config.search.max_candidates, 5000);
    }

    #[test]
    fn test_mail_debug_redacts_password() {
        let mail = MailConfig {
            password: "hunter2".to_string(),
            ..MailConfig::default()
        };
        let output = format!("{mail:?}");
        assert!(!output.contains("hunter2"));
        assert!(output.contains("[redacted]"));
    }
}

//! Configuration loading for repopin.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `REPOPIN_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `REPOPIN_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Override for the hosting provider API base URL (mock servers, GHE).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_api_base: Option<String>,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Sync-run configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SyncConfig {
    /// Fixed rate-limit window applied per sync secret, in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,

    /// Maximum trigger requests allowed per secret within one window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Cooperative delay inserted between repositories in a run, in
    /// milliseconds. Keeps the run under the provider's secondary limits.
    #[serde(default = "default_bump_delay_ms")]
    pub bump_delay_ms: u64,

    /// Number of most recent commits the history rewriter inspects.
    #[serde(default = "default_cleanup_window")]
    pub cleanup_window: usize,

    /// Interval between rate-limit entry expiry sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_ms: default_rate_limit_window_ms(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            bump_delay_ms: default_bump_delay_ms(),
            cleanup_window: default_cleanup_window(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl SyncConfig {
    /// Validate sync configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_window_ms < 1_000 {
            return Err(ConfigError::InvalidRateLimitWindow {
                value: self.rate_limit_window_ms,
            });
        }

        if self.rate_limit_max_requests == 0 {
            return Err(ConfigError::InvalidRateLimitMaxRequests {
                value: self.rate_limit_max_requests,
            });
        }

        // The rewriter only ever needs to clean commits it just created near
        // HEAD; a window outside these bounds is either useless or abusive.
        if !(10..=100).contains(&self.cleanup_window) {
            return Err(ConfigError::InvalidCleanupWindow {
                value: self.cleanup_window,
            });
        }

        if self.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidSweepInterval {
                value: self.sweep_interval_seconds,
            });
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            github_api_base: None,
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (connection secrets removed).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.database_url != default_database_url() {
            config.database_url = "[REDACTED]".to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if settings are out
    /// of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.validate()
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://repopin.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_rate_limit_window_ms() -> u64 {
    60_000 // one minute
}

fn default_rate_limit_max_requests() -> u32 {
    3
}

fn default_bump_delay_ms() -> u64 {
    1500
}

fn default_cleanup_window() -> usize {
    30
}

fn default_sweep_interval_seconds() -> u64 {
    300 // 5 minutes
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("rate limit window must be at least 1000 ms, got {value}")]
    InvalidRateLimitWindow { value: u64 },
    #[error("rate limit max requests must be positive, got {value}")]
    InvalidRateLimitMaxRequests { value: u32 },
    #[error("cleanup window must be between 10 and 100 commits, got {value}")]
    InvalidCleanupWindow { value: usize },
    #[error("sweep interval must be positive, got {value}")]
    InvalidSweepInterval { value: u64 },
}

/// Loads configuration using layered `.env` files and `REPOPIN_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration: layered `.env` files first, process env last.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("REPOPIN_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let github_api_base = layered
            .remove("GITHUB_API_BASE")
            .filter(|v| !v.is_empty());

        let sync = SyncConfig {
            rate_limit_window_ms: layered
                .remove("SYNC_RATE_LIMIT_WINDOW_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_window_ms),
            rate_limit_max_requests: layered
                .remove("SYNC_RATE_LIMIT_MAX_REQUESTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_max_requests),
            bump_delay_ms: layered
                .remove("SYNC_BUMP_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_bump_delay_ms),
            cleanup_window: layered
                .remove("CLEANUP_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_cleanup_window),
            sweep_interval_seconds: layered
                .remove("SYNC_SWEEP_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sweep_interval_seconds),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            github_api_base,
            sync,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("REPOPIN_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("REPOPIN_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

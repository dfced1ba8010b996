//! Runtime configuration
//!
//! Everything comes from the environment (optionally seeded from a `.env`
//! file). The variable names used by the deployed function are accepted
//! first, the conventional `S3_*`/`DATABASE_*` names as fallbacks.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::collector::{CollectorConfig, DEFAULT_FETCH_CONCURRENCY, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::pipeline::{PipelineConfig, DEFAULT_RUN_TIMEOUT_SECS};
use crate::storage::StorageConfig;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

pub const DEFAULT_SERVER_PORT: u16 = 8080;

pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineSettings,
    pub server: ServerConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL usually embeds the password
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Fan-out and deadline knobs. A timeout of 0 disables that deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub run_timeout_secs: u64,
}

/// Only used by the request/response handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Load `.env` (if present), read the environment and validate.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        Self {
            storage: StorageConfig::from_env(),
            database: DatabaseConfig {
                url: first_var(&["CONNECTION_STRING", "DATABASE_URL"]).unwrap_or_default(),
                max_connections: parsed_var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: parsed_var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: parsed_var("DATABASE_CONNECT_TIMEOUT")
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            pipeline: PipelineSettings {
                fetch_concurrency: parsed_var("FETCH_CONCURRENCY")
                    .unwrap_or(DEFAULT_FETCH_CONCURRENCY),
                fetch_timeout_secs: parsed_var("FETCH_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
                run_timeout_secs: parsed_var("RUN_TIMEOUT_SECS").unwrap_or(DEFAULT_RUN_TIMEOUT_SECS),
            },
            server: ServerConfig {
                host: first_var(&["DSR_HOST"]).unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
                port: parsed_var("DSR_PORT").unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: parsed_var("DSR_SHUTDOWN_TIMEOUT")
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.bucket.trim().is_empty() {
            anyhow::bail!("Bucket name is required (set BUCKET)");
        }

        if self.database.url.trim().is_empty() {
            anyhow::bail!("Database URL is required (set CONNECTION_STRING)");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.pipeline.fetch_concurrency == 0 {
            anyhow::bail!("FETCH_CONCURRENCY must be greater than 0");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            collector: CollectorConfig {
                concurrency: self.pipeline.fetch_concurrency,
                fetch_timeout: seconds(self.pipeline.fetch_timeout_secs),
            },
            run_timeout: seconds(self.pipeline.run_timeout_secs),
        }
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn first_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

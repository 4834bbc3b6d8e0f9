//! Configuration management for the restaurant order and stock service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with RESTO_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::SlidingWindow;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Storage backend selection
    pub storage: StorageConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Public order intake throttling
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Key rate limiting on the first `X-Forwarded-For` entry.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// In-process store, for local runs without a database
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify staff tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Sliding window length in seconds
    pub window_secs: i64,

    /// Accepted submissions per client within the window
    pub max_requests: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("RESTO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.trust_forwarded_for", false)?
            .set_default("storage.backend", "postgres")?
            .set_default("database.url", "postgres://localhost/restaurant_ops")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("rate_limit.max_requests", 5)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RESTO_ prefix)
            .add_source(
                Environment::with_prefix("RESTO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> SlidingWindow {
        SlidingWindow::new(chrono::Duration::seconds(self.window_secs), self.max_requests)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/restaurant_ops".to_string(),
            max_connections: 10,
            min_connections: 2,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "development-secret-key".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_window_defaults() {
        let window = RateLimitConfig::default().window();
        assert_eq!(window.window.num_seconds(), 60);
        assert_eq!(window.max_hits, 5);
    }

    #[test]
    fn test_storage_backend_names() {
        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
    }
}

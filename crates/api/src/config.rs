//! Application configuration

use std::env;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_origin: String,

    // Database (in-memory store when unset)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Redis (in-memory presence registry when unset)
    pub redis_url: Option<String>,
    pub registry_timeout_ms: u64,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Fanout
    pub fanout_shards: usize,

    // Logging
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            // Database
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Redis
            redis_url: non_empty("REDIS_URL"),
            registry_timeout_ms: env::var("REGISTRY_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Fanout
            fanout_shards: env::var("FANOUT_SHARDS")
                .unwrap_or_else(|_| "8".to_string())
                .parse::<usize>()
                .unwrap_or(8)
                .max(1),

            // Logging
            log_format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_ascii_lowercase()
                .as_str()
            {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => return Err(ConfigError::Invalid("LOG_FORMAT must be `pretty` or `json`")),
            },
        })
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }

    /// Configuration for tests and local tooling, with in-memory backends
    pub fn for_testing(jwt_secret: &str) -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
            database_url: None,
            database_max_connections: 10,
            redis_url: None,
            registry_timeout_ms: 2000,
            jwt_secret: jwt_secret.to_string(),
            jwt_expiry_hours: 24,
            fanout_shards: 4,
            log_format: LogFormat::Pretty,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

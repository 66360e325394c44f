//! Configuration management for the stock ledger service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with the STOCKD prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    pub ledger: LedgerConfig,

    pub alerts: AlertConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,

    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    pub acquire_timeout_secs: u64,

    /// Run embedded migrations on startup outside development
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub default_page_size: u32,

    /// Upper bound applied to any requested `per_page`
    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertConfig {
    /// Scan stock levels once when the server starts
    pub generate_on_startup: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKD_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", false)?
            .set_default("jwt.access_token_expiry", 28800)?
            .set_default("ledger.default_page_size", 50)?
            .set_default("ledger.max_page_size", 500)?
            .set_default("alerts.generate_on_startup", false)?
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // STOCKD__DATABASE__URL, STOCKD__JWT__SECRET, ...
            .add_source(
                Environment::with_prefix("STOCKD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Whether embedded migrations run on startup
    pub fn should_migrate(&self) -> bool {
        self.is_development() || self.database.run_migrations
    }
}

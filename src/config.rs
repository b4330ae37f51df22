//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Which repository backs the running server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue("STORAGE")),
        }
    }
}

/// SMTP settings; absent when notifications are only logged
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub storage: StorageBackend,

    /// Display name used in notification emails
    pub bank_name: String,

    /// Sender address of notification emails
    pub bank_email: String,

    /// Four ASCII letters prefixed to every bank account unique id
    pub unique_id_prefix: String,

    /// Six-digit issuer identification number for generated cards
    pub card_issuer_prefix: String,

    pub lockout_max_failed_attempts: i32,
    pub lockout_duration_minutes: i64,

    /// bcrypt work factor for password hashes
    pub bcrypt_cost: u32,

    pub smtp: Option<SmtpConfig>,

    /// Origins allowed by CORS
    pub cors_allowed_origins: Vec<String>,

    /// Emit logs as JSON
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage: StorageBackend = env::var("STORAGE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let bank_name = env::var("BANK_NAME").unwrap_or_else(|_| "Bank System".to_string());
        let bank_email =
            env::var("BANK_EMAIL").unwrap_or_else(|_| "no-reply@banksystem.local".to_string());

        let unique_id_prefix =
            env::var("BANK_UNIQUE_ID_PREFIX").unwrap_or_else(|_| "ABCJ".to_string());
        if unique_id_prefix.len() != 4 || !unique_id_prefix.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::InvalidValue("BANK_UNIQUE_ID_PREFIX"));
        }

        let card_issuer_prefix =
            env::var("CARD_ISSUER_PREFIX").unwrap_or_else(|_| "522408".to_string());
        if card_issuer_prefix.len() != 6 || !card_issuer_prefix.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ConfigError::InvalidValue("CARD_ISSUER_PREFIX"));
        }

        let lockout_max_failed_attempts = env::var("LOCKOUT_MAX_FAILED_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("LOCKOUT_MAX_FAILED_ATTEMPTS"))?;

        let lockout_duration_minutes = env::var("LOCKOUT_DURATION_MINUTES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("LOCKOUT_DURATION_MINUTES"))?;

        let bcrypt_cost = env::var("BCRYPT_COST")
            .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("BCRYPT_COST"))?;

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                username: env::var("SMTP_USERNAME")
                    .map_err(|_| ConfigError::MissingEnv("SMTP_USERNAME"))?,
                password: env::var("SMTP_PASSWORD")
                    .map_err(|_| ConfigError::MissingEnv("SMTP_PASSWORD"))?,
            }),
            _ => None,
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            storage,
            bank_name,
            bank_email,
            unique_id_prefix: unique_id_prefix.to_ascii_uppercase(),
            card_issuer_prefix,
            lockout_max_failed_attempts,
            lockout_duration_minutes,
            bcrypt_cost,
            smtp,
            cors_allowed_origins,
            log_json,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    /// Development defaults backed by the in-memory repository
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "development".to_string(),
            storage: StorageBackend::Memory,
            bank_name: "Bank System".to_string(),
            bank_email: "no-reply@banksystem.local".to_string(),
            unique_id_prefix: "ABCJ".to_string(),
            card_issuer_prefix: "522408".to_string(),
            lockout_max_failed_attempts: 5,
            lockout_duration_minutes: 5,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            smtp: None,
            cors_allowed_origins: Vec::new(),
            log_json: false,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert_eq!(" Memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.unique_id_prefix.len(), 4);
        assert!(!config.is_production());
    }
}

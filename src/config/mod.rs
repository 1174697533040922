//! Configuration management for the wallet session server
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Lifetimes of the two session tokens and their cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Access token lifetime in seconds (default: 900 = 15 minutes)
    pub access_ttl_seconds: i64,
    /// Delay before a refresh token may be used, in seconds (default: 600 = 10 minutes)
    pub refresh_not_before_seconds: i64,
    /// Refresh token lifetime in seconds (default: 604800 = 7 days)
    pub refresh_ttl_seconds: i64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            access_ttl_seconds: 15 * 60,
            refresh_not_before_seconds: 10 * 60,
            refresh_ttl_seconds: 7 * 24 * 60 * 60,
        }
    }
}

/// Expectations a SIWE message must satisfy beyond nonce and address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiweExpectations {
    /// Domain the message must be bound to, if enforced
    pub domain: Option<String>,
    /// Chain id the message must name, if enforced
    pub chain_id: Option<u64>,
}

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";
const DEV_COOKIE_SECRET: &str = "development-cookie-secret-change-in-production";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for token signing
    pub jwt_secret: String,

    /// Secret used to sign the refresh cookie, independent of the JWT secret
    pub cookie_secret: String,

    /// Token and cookie lifetimes
    pub session: SessionTimings,

    /// Auth nonce TTL in seconds (default: 300 = 5 minutes)
    pub auth_nonce_ttl_seconds: i64,

    /// Redis URL; when set, nonces are shared through Redis instead of process memory
    pub redis_url: Option<String>,

    /// SIWE domain / chain id enforcement
    pub siwe: SiweExpectations,

    /// JSON-RPC endpoint used for ERC-1271 contract wallet signatures
    pub eth_rpc_url: Option<String>,

    /// Directory holding the single-page application build
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .unwrap_or(5);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = secret_var("JWT_SECRET", DEV_JWT_SECRET, environment)?;
        let cookie_secret = secret_var("COOKIE_SECRET", DEV_COOKIE_SECRET, environment)?;

        let auth_nonce_ttl_seconds = parse_nonce_ttl(non_empty_var("AUTH_NONCE_TTL_SECONDS"))?;

        let redis_url = non_empty_var("REDIS_URL");

        let chain_id = match non_empty_var("SIWE_CHAIN_ID") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!("SIWE_CHAIN_ID must be a number, got '{raw}'"))
            })?),
            None => None,
        };

        let siwe = SiweExpectations {
            domain: non_empty_var("SIWE_DOMAIN"),
            chain_id,
        };

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            cookie_secret,
            session: SessionTimings::default(),
            auth_nonce_ttl_seconds,
            redis_url,
            siwe,
            eth_rpc_url: non_empty_var("ETH_RPC_URL"),
            static_dir: non_empty_var("STATIC_DIR").map(PathBuf::from),
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Nonce lifetime in seconds; must be positive (default 300).
fn parse_nonce_ttl(raw: Option<String>) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(300);
    };

    match raw.parse::<i64>() {
        Ok(ttl) if ttl > 0 => Ok(ttl),
        _ => Err(ConfigError::InvalidValue(format!(
            "AUTH_NONCE_TTL_SECONDS must be a positive number of seconds, got '{raw}'"
        ))),
    }
}

/// Secrets fall back to a development value everywhere but production.
fn secret_var(key: &str, dev_default: &str, environment: Environment) -> Result<String, ConfigError> {
    match non_empty_var(key) {
        Some(value) => Ok(value),
        None if environment.is_production() => Err(ConfigError::MissingEnvVar(key.to_string())),
        None => {
            tracing::warn!(variable = key, "Secret not set, using development default");
            Ok(dev_default.to_string())
        }
    }
}

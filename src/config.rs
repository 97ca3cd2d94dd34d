// src/config.rs

use std::{env, fmt, net::SocketAddr};

const DEFAULT_DATABASE_URL: &str = "sqlite://project_board.db?mode=rwc";
const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24 * 14;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Runtime configuration, read from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// HMAC secret used to sign session tokens.
    pub session_secret: String,
    pub session_ttl_seconds: u64,
    /// Adds the `Secure` attribute to the session cookie.
    pub cookie_secure: bool,
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub rust_log: String,
    pub admin: Option<AdminSeed>,
}

/// Credentials for the staff account created at startup when absent.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub phone: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has an invalid value: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let session_secret = lookup("SESSION_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("SESSION_SECRET"))?;

        let session_ttl_seconds = match lookup("SESSION_TTL_SECONDS") {
            Some(raw) => raw.parse::<u64>().ok().filter(|ttl| *ttl > 0).ok_or(ConfigError::Invalid {
                key: "SESSION_TTL_SECONDS",
                value: raw,
            })?,
            None => DEFAULT_SESSION_TTL_SECONDS,
        };

        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                key: "COOKIE_SECURE",
                value: raw,
            })?,
            None => false,
        };

        let raw_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: raw_addr.clone(),
        })?;

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD"), lookup("ADMIN_PHONE")) {
            (Some(email), Some(password), Some(phone)) => Some(AdminSeed { email, password, phone }),
            _ => None,
        };

        Ok(Self {
            database_url,
            session_secret,
            session_ttl_seconds,
            cookie_secure,
            bind_addr,
            allowed_origins,
            rust_log,
            admin,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

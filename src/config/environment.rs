// ABOUTME: Environment-based server configuration (ports, storage URL, CORS, OAuth settings)
// ABOUTME: Environment-only configuration with typed parsing helpers and a redacted summary
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use authz_core::errors::{AppError, AppResult};
use tracing::info;

use super::oauth::{OAuth2RateLimitConfig, OAuth2ServerConfig};

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8081;

/// Default storage location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/portfolio-authz.db";

/// Storage backend selected by `DATABASE_URL`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// SQLite database file
    SQLite {
        /// Path to the database file
        path: PathBuf,
    },
    /// In-process SQLite database, lost on shutdown
    SQLiteMemory,
    /// Lock-free in-memory maps, lost on shutdown
    Memory,
}

impl DatabaseUrl {
    /// Parse a storage URL
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported schemes
    pub fn parse_url(s: &str) -> AppResult<Self> {
        if s == "memory" || s == "memory://" {
            return Ok(Self::Memory);
        }
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            let path_str = path_str.trim_start_matches("//");
            if path_str == ":memory:" {
                return Ok(Self::SQLiteMemory);
            }
            if path_str.is_empty() {
                return Err(AppError::config_invalid("DATABASE_URL has an empty path"));
            }
            return Ok(Self::SQLite {
                path: PathBuf::from(path_str),
            });
        }
        Err(AppError::config_invalid(format!(
            "Unsupported DATABASE_URL scheme: {s}"
        )))
    }

    /// Connection string accepted by sqlx
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::SQLiteMemory => "sqlite::memory:".to_owned(),
            Self::Memory => "memory".to_owned(),
        }
    }
}

impl Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_connection_string())
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Storage backend
    pub database: DatabaseUrl,
    /// Allowed CORS origins, `*` for any
    pub cors_allowed_origins: Vec<String>,
    /// Authorization server settings
    pub oauth2_server: OAuth2ServerConfig,
    /// OAuth endpoint rate limits
    pub rate_limit: OAuth2RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            http_port: DEFAULT_HTTP_PORT,
            database: DatabaseUrl::Memory,
            cors_allowed_origins: vec!["*".to_owned()],
            oauth2_server: OAuth2ServerConfig::default(),
            rate_limit: OAuth2RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from process environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but invalid
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");
        Self::from_vars(&|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but invalid
    pub fn from_vars(var: &impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());
        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            http_port: parse_number(var, "HTTP_PORT", DEFAULT_HTTP_PORT)?,
            database: DatabaseUrl::parse_url(&database_url)?,
            cors_allowed_origins: parse_origins(
                &var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_owned()),
            ),
            oauth2_server: OAuth2ServerConfig::from_vars(var)?,
            rate_limit: OAuth2RateLimitConfig::from_vars(var)?,
        })
    }

    /// Human-readable summary without secrets
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Portfolio Authz Configuration:\n\
             - Bind: {}:{}\n\
             - Database: {}\n\
             - OAuth issuer: {}\n\
             - Access token TTL: {}s\n\
             - Rate limiting: {}\n\
             - CORS origins: {}",
            self.host,
            self.http_port,
            self.database,
            self.oauth2_server
                .issuer_url
                .as_deref()
                .unwrap_or("disabled"),
            self.oauth2_server.access_token_ttl_secs,
            if self.rate_limit.enabled {
                "enabled"
            } else {
                "disabled"
            },
            self.cors_allowed_origins.join(", "),
        )
    }
}

/// Parse a numeric variable, falling back to `default` when unset
///
/// # Errors
///
/// Returns a configuration error if the value is set but does not parse
pub fn parse_number<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config_invalid(format!("{key}={raw:?} is invalid: {e}"))),
        None => Ok(default),
    }
}

/// Parse a boolean variable (`true/false/1/0/yes/no`)
///
/// # Errors
///
/// Returns a configuration error for any other value
pub fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> AppResult<bool> {
    match var(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(AppError::config_invalid(format!(
            "{key}={other:?} is not a boolean"
        ))),
    }
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_urls() {
        assert_eq!(DatabaseUrl::parse_url("memory").unwrap(), DatabaseUrl::Memory);
        assert_eq!(
            DatabaseUrl::parse_url("sqlite::memory:").unwrap(),
            DatabaseUrl::SQLiteMemory
        );
        assert_eq!(
            DatabaseUrl::parse_url("sqlite:./data/a.db").unwrap(),
            DatabaseUrl::SQLite {
                path: PathBuf::from("./data/a.db")
            }
        );
        assert!(DatabaseUrl::parse_url("postgres://localhost/db").is_err());
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = ServerConfig::from_vars(&|_| None).unwrap();
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert!(!config.oauth2_server.is_enabled());
        assert_eq!(config.cors_allowed_origins, vec!["*".to_owned()]);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = ServerConfig::from_vars(&|key| (key == "HTTP_PORT").then(|| "http".to_owned()));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_origins_list() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,"),
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
    }
}

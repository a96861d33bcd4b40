// ABOUTME: OAuth 2.1 authorization server configuration loaded from the environment
// ABOUTME: Issuer, signing secret, grant lifetimes, state secret, and rate limit settings
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::fmt;

use authz_core::constants::oauth::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_AUTH_CODE_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_DAYS,
    MIN_JWT_SECRET_BYTES, PROTECTED_RESOURCE_METADATA_PATH,
};
use authz_core::errors::{AppError, AppResult};

use super::environment::{parse_bool, parse_number};

/// OAuth 2.1 authorization server configuration
#[derive(Clone)]
pub struct OAuth2ServerConfig {
    /// Public issuer URL. `None` disables the authorization server entirely.
    pub issuer_url: Option<String>,
    /// Protected resource identifier advertised in discovery (defaults to issuer)
    pub resource_url: Option<String>,
    /// HS256 signing secret for access tokens
    pub jwt_secret: Option<String>,
    /// HMAC secret for the federated login state codec (defaults to `jwt_secret`)
    pub state_secret: Option<String>,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: i64,
    /// Authorization code lifetime in seconds
    pub auth_code_ttl_secs: i64,
    /// Refresh token lifetime in days
    pub refresh_token_ttl_days: i64,
    /// Interval of the expired-grant purge task in seconds (0 disables it)
    pub purge_interval_secs: u64,
}

impl Default for OAuth2ServerConfig {
    fn default() -> Self {
        Self {
            issuer_url: None,
            resource_url: None,
            jwt_secret: None,
            state_secret: None,
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            auth_code_ttl_secs: DEFAULT_AUTH_CODE_TTL_SECS,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            purge_interval_secs: 3600,
        }
    }
}

impl fmt::Debug for OAuth2ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2ServerConfig")
            .field("issuer_url", &self.issuer_url)
            .field("resource_url", &self.resource_url)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "state_secret",
                &self.state_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("auth_code_ttl_secs", &self.auth_code_ttl_secs)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("purge_interval_secs", &self.purge_interval_secs)
            .finish()
    }
}

impl OAuth2ServerConfig {
    /// Load from a variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer is set without a signing secret, if a
    /// secret is shorter than 32 bytes, or if a lifetime is not a positive number
    pub fn from_vars(var: &impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let issuer_url = var("OAUTH2_ISSUER_URL")
            .map(|url| url.trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty());
        let resource_url = var("OAUTH2_RESOURCE_URL")
            .map(|url| url.trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty());
        let jwt_secret = var("OAUTH2_JWT_SECRET").filter(|s| !s.is_empty());
        let state_secret = var("OAUTH2_STATE_SECRET").filter(|s| !s.is_empty());

        let config = Self {
            issuer_url,
            resource_url,
            jwt_secret,
            state_secret,
            access_token_ttl_secs: parse_number(
                var,
                "OAUTH2_ACCESS_TOKEN_TTL_SECS",
                DEFAULT_ACCESS_TOKEN_TTL_SECS,
            )?,
            auth_code_ttl_secs: parse_number(
                var,
                "OAUTH2_AUTH_CODE_TTL_SECS",
                DEFAULT_AUTH_CODE_TTL_SECS,
            )?,
            refresh_token_ttl_days: parse_number(
                var,
                "OAUTH2_REFRESH_TOKEN_TTL_DAYS",
                DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            )?,
            purge_interval_secs: parse_number(var, "OAUTH2_PURGE_INTERVAL_SECS", 3600)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first violated constraint
    pub fn validate(&self) -> AppResult<()> {
        if self.issuer_url.is_some() && self.jwt_secret.is_none() {
            return Err(AppError::config_missing("OAUTH2_JWT_SECRET"));
        }
        if let Some(issuer) = &self.issuer_url {
            url::Url::parse(issuer).map_err(|e| {
                AppError::config_invalid(format!("OAUTH2_ISSUER_URL is not a valid URL: {e}"))
            })?;
        }
        for (key, secret) in [
            ("OAUTH2_JWT_SECRET", &self.jwt_secret),
            ("OAUTH2_STATE_SECRET", &self.state_secret),
        ] {
            if secret
                .as_ref()
                .is_some_and(|s| s.len() < MIN_JWT_SECRET_BYTES)
            {
                return Err(AppError::config_invalid(format!(
                    "{key} must be at least {MIN_JWT_SECRET_BYTES} bytes"
                )));
            }
        }
        if self.access_token_ttl_secs <= 0
            || self.auth_code_ttl_secs <= 0
            || self.refresh_token_ttl_days <= 0
        {
            return Err(AppError::config_invalid(
                "OAuth token lifetimes must be positive",
            ));
        }
        Ok(())
    }

    /// The authorization server is served only when an issuer and a secret exist
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.issuer_url.is_some() && self.jwt_secret.is_some()
    }

    /// Protected resource identifier, falling back to the issuer
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.resource_url
            .as_deref()
            .or(self.issuer_url.as_deref())
    }

    /// URL of the protected resource metadata document
    #[must_use]
    pub fn resource_metadata_url(&self) -> Option<String> {
        self.issuer_url
            .as_ref()
            .map(|issuer| format!("{issuer}{PROTECTED_RESOURCE_METADATA_PATH}"))
    }

    /// Secret used by the state codec
    #[must_use]
    pub fn effective_state_secret(&self) -> Option<&str> {
        self.state_secret
            .as_deref()
            .or(self.jwt_secret.as_deref())
    }
}

/// Rate limits for the OAuth endpoints, per client IP
#[derive(Debug, Clone)]
pub struct OAuth2RateLimitConfig {
    /// Master switch
    pub enabled: bool,
    /// Window length in seconds
    pub window_secs: u64,
    /// Requests per window to `/oauth/register`
    pub register_rpm: u32,
    /// Requests per window to `/oauth/authorize`
    pub authorize_rpm: u32,
    /// Requests per window to `/oauth/token`
    pub token_rpm: u32,
    /// Tracked-entry count above which expired windows are swept
    pub cleanup_threshold: usize,
}

impl Default for OAuth2RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            register_rpm: 10,
            authorize_rpm: 60,
            token_rpm: 60,
            cleanup_threshold: 10_000,
        }
    }
}

impl OAuth2RateLimitConfig {
    /// Load from a variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not parse
    pub fn from_vars(var: &impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Self::default();
        let config = Self {
            enabled: parse_bool(var, "OAUTH2_RATE_LIMIT_ENABLED", defaults.enabled)?,
            window_secs: parse_number(var, "OAUTH2_RATE_LIMIT_WINDOW_SECS", defaults.window_secs)?,
            register_rpm: parse_number(var, "OAUTH2_RATE_LIMIT_REGISTER", defaults.register_rpm)?,
            authorize_rpm: parse_number(
                var,
                "OAUTH2_RATE_LIMIT_AUTHORIZE",
                defaults.authorize_rpm,
            )?,
            token_rpm: parse_number(var, "OAUTH2_RATE_LIMIT_TOKEN", defaults.token_rpm)?,
            cleanup_threshold: defaults.cleanup_threshold,
        };
        if config.window_secs == 0 {
            return Err(AppError::config_invalid(
                "OAUTH2_RATE_LIMIT_WINDOW_SECS must be positive",
            ));
        }
        Ok(config)
    }

    /// Disabled limiter, used by tests and embedded deployments
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

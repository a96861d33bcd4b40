// ABOUTME: OAuth2 endpoint rate limiting with RFC-compliant headers and rejection handling
// ABOUTME: Fixed-window per-IP counters for the register, authorize, and token endpoints
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use authz_core::constants::oauth::{AUTHORIZE_PATH, REGISTER_PATH, TOKEN_PATH};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::warn;

use super::models::OAuth2Error;
use crate::config::OAuth2RateLimitConfig;

/// Rate limit headers
pub mod headers {
    /// Requests allowed per window
    pub const X_RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
    /// Requests left in the current window
    pub const X_RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
    /// Unix time the current window resets
    pub const X_RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
    /// Seconds until a retry may succeed
    pub const RETRY_AFTER: &str = "Retry-After";
}

/// Rate limited OAuth2 endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuth2Endpoint {
    /// `POST /oauth/register`
    Register,
    /// `GET|POST /oauth/authorize`
    Authorize,
    /// `POST /oauth/token`
    Token,
}

impl OAuth2Endpoint {
    /// Map a request path to a limited endpoint
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            REGISTER_PATH => Some(Self::Register),
            AUTHORIZE_PATH => Some(Self::Authorize),
            TOKEN_PATH => Some(Self::Token),
            _ => None,
        }
    }

    /// Stable name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Authorize => "authorize",
            Self::Token => "token",
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OAuth2RateLimitStatus {
    /// Whether this request is rejected
    pub is_limited: bool,
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left after this one
    pub remaining: u32,
    /// Unix time the window resets
    pub reset_at: i64,
    /// Seconds until the window resets, set only when limited
    pub retry_after_seconds: Option<u64>,
}

/// `OAuth2` rate limiter with per-endpoint, per-IP tracking
///
/// Counters live in a sharded `DashMap` so concurrent requests only contend
/// on their own shard.
#[derive(Clone)]
pub struct OAuth2RateLimiter {
    state: Arc<DashMap<(OAuth2Endpoint, IpAddr), (u32, Instant)>>,
    config: OAuth2RateLimitConfig,
}

impl OAuth2RateLimiter {
    /// Create a limiter with the given configuration
    #[must_use]
    pub fn new(config: OAuth2RateLimitConfig) -> Self {
        Self {
            state: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Whether checks are enforced at all
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    const fn limit_for(&self, endpoint: OAuth2Endpoint) -> u32 {
        match endpoint {
            OAuth2Endpoint::Register => self.config.register_rpm,
            OAuth2Endpoint::Authorize => self.config.authorize_rpm,
            OAuth2Endpoint::Token => self.config.token_rpm,
        }
    }

    /// Count a request and report whether it is over the limit
    #[must_use]
    pub fn check_rate_limit(
        &self,
        endpoint: OAuth2Endpoint,
        client_ip: IpAddr,
    ) -> OAuth2RateLimitStatus {
        let limit = self.limit_for(endpoint);
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_secs);

        let mut entry = self.state.entry((endpoint, client_ip)).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) >= window {
            *count = 0;
            *window_start = now;
        }

        let is_limited = *count >= limit;
        if !is_limited {
            *count += 1;
        }
        let remaining = limit.saturating_sub(*count);
        let elapsed = now.duration_since(*window_start);
        // Release the shard lock before any cleanup
        drop(entry);

        if self.state.len() > self.config.cleanup_threshold {
            self.cleanup_old_entries(now, window);
        }

        let until_reset = window.saturating_sub(elapsed);
        let reset_at = SystemTime::now()
            .checked_add(until_reset)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));

        OAuth2RateLimitStatus {
            is_limited,
            limit,
            remaining,
            reset_at,
            // Round up so clients never retry a moment too early
            retry_after_seconds: is_limited
                .then(|| until_reset.as_secs() + u64::from(until_reset.subsec_nanos() > 0)),
        }
    }

    fn cleanup_old_entries(&self, now: Instant, window: Duration) {
        self.state
            .retain(|_key, (_count, start)| now.duration_since(*start) < window);
    }
}

fn set_header(response: &mut Response, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, value);
    }
}

/// Attach `X-RateLimit-*` headers, plus `Retry-After` when limited
pub fn apply_rate_limit_headers(response: &mut Response, status: &OAuth2RateLimitStatus) {
    set_header(response, headers::X_RATE_LIMIT_LIMIT, status.limit);
    set_header(response, headers::X_RATE_LIMIT_REMAINING, status.remaining);
    set_header(response, headers::X_RATE_LIMIT_RESET, status.reset_at);
    if let Some(retry_after) = status.retry_after_seconds {
        set_header(response, headers::RETRY_AFTER, retry_after);
    }
}

/// Axum middleware enforcing the limiter on the OAuth2 endpoints
///
/// Requests without `ConnectInfo` (in-process tests) are counted under the
/// unspecified address.
pub async fn oauth2_rate_limit(
    State(limiter): State<OAuth2RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = match OAuth2Endpoint::from_path(request.uri().path()) {
        Some(endpoint) if limiter.is_enabled() => endpoint,
        _ => return next.run(request).await,
    };

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip());

    let status = limiter.check_rate_limit(endpoint, client_ip);
    if status.is_limited {
        warn!(
            endpoint = endpoint.as_str(),
            client_ip = %client_ip,
            limit = status.limit,
            "OAuth2 rate limit exceeded"
        );
        let mut response = OAuth2Error::temporarily_unavailable(&format!(
            "Rate limit exceeded for {} endpoint, retry later",
            endpoint.as_str()
        ))
        .into_response();
        apply_rate_limit_headers(&mut response, &status);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(&mut response, &status);
    response
}

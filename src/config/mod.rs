// ABOUTME: Configuration management module for environment-driven server settings
// ABOUTME: Re-exports server, storage, OAuth, and rate limit configuration types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Environment-only configuration. There are no config files.

/// Server-level configuration (bind address, storage, CORS)
pub mod environment;

/// OAuth 2.1 authorization server settings
pub mod oauth;

pub use environment::{DatabaseUrl, ServerConfig};
pub use oauth::{OAuth2RateLimitConfig, OAuth2ServerConfig};

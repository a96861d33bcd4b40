// ABOUTME: Application-wide constants for the authorization server
// ABOUTME: Groups OAuth protocol constants and service identity values
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Constants module

/// OAuth 2.1 protocol constants
pub mod oauth;

/// Service identity used in logs and health responses
pub mod service {
    /// Default service name
    pub const SERVICE_NAME: &str = "portfolio-authz";
    /// Crate version reported by health checks
    pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
}

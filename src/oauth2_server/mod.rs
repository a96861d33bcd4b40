// ABOUTME: OAuth 2.1 authorization server with HS256 JWT access tokens
// ABOUTME: Provides RFC 7591 client registration, PKCE authorization, and refresh token rotation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// RFC 7591 dynamic client registration implementation
pub mod client_registration;
/// Consent form and browser error rendering
pub mod consent;
/// OAuth 2.0 authorization server endpoints
pub mod endpoints;
/// OAuth 2.0 data models and types
pub mod models;
/// PKCE S256 verification
pub mod pkce;
/// Rate limiting for OAuth 2.0 endpoints
pub mod rate_limiting;
/// Axum routes for the OAuth 2.0 endpoints
pub mod routes;

// RFC 7591 client registration management
pub use client_registration::ClientRegistrationManager;

/// OAuth 2.0 authorization server
pub use endpoints::OAuth2AuthorizationServer;
/// Authorization request rejection
pub use endpoints::AuthorizeRejection;
/// Consent submission outcome
pub use endpoints::ConsentOutcome;
/// Authorization request that passed validation
pub use endpoints::ValidatedAuthorization;

/// Authorization request
pub use models::AuthorizeRequest;
/// Client registration request
pub use models::ClientRegistrationRequest;
/// Client registration response
pub use models::ClientRegistrationResponse;
/// Consent form submission
pub use models::ConsentForm;
/// OAuth 2.0 error response
pub use models::OAuth2Error;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;

// OAuth 2.0 rate limiting
pub use rate_limiting::OAuth2RateLimiter;

/// OAuth 2.0 route handlers
pub use routes::OAuth2Routes;

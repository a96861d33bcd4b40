// ABOUTME: OAuth 2.1 protocol constants shared by endpoints, discovery and stores
// ABOUTME: Single supported scope, PKCE method, grant types, and lifetime defaults
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// The only scope this server grants. Requested scopes are coerced to it.
pub const SUPPORTED_SCOPE: &str = "mcp";

/// The only accepted PKCE code challenge method
pub const PKCE_METHOD_S256: &str = "S256";

/// `response_type` accepted by the authorization endpoint
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Authorization code grant
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// Refresh token grant
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

/// Token type returned by the token endpoint
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Client authentication via form fields
pub const AUTH_METHOD_CLIENT_SECRET_POST: &str = "client_secret_post";

/// Client authentication via HTTP Basic
pub const AUTH_METHOD_CLIENT_SECRET_BASIC: &str = "client_secret_basic";

/// Default access token lifetime in seconds
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Default authorization code lifetime in seconds
pub const DEFAULT_AUTH_CODE_TTL_SECS: i64 = 600;

/// Default refresh token lifetime in days
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Maximum age of a signed state payload in seconds
pub const STATE_MAX_AGE_SECS: i64 = 600;

/// Allowed clock skew for state payloads stamped in the future
pub const STATE_FUTURE_SKEW_SECS: i64 = 60;

/// Maximum length of a registered client name, in characters
pub const MAX_CLIENT_NAME_LEN: usize = 200;

/// Maximum number of redirect URIs per client
pub const MAX_REDIRECT_URIS: usize = 10;

/// Random bytes in an authorization code, refresh token, or client secret
pub const TOKEN_ENTROPY_BYTES: usize = 32;

/// Minimum length of the HS256 signing secret
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Path of the protected resource metadata document
pub const PROTECTED_RESOURCE_METADATA_PATH: &str = "/.well-known/oauth-protected-resource";

/// Path of the authorization server metadata document
pub const AUTHORIZATION_SERVER_METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

/// Authorization endpoint path
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";

/// Token endpoint path
pub const TOKEN_PATH: &str = "/oauth/token";

/// Dynamic client registration endpoint path
pub const REGISTER_PATH: &str = "/oauth/register";

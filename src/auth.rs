// ABOUTME: HS256 access token issuing and validation for the OAuth 2.1 authorization server
// ABOUTME: Defines the fixed claim set and typed JWT validation errors
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Access Tokens
//!
//! Access tokens are HS256 JWTs signed with one shared secret. The claim set
//! is fixed: `jti, sub, email, name, role, client_id, scope, iss, iat, exp`.
//! Validation checks signature, algorithm and issuer first, and expiry second,
//! so an expired token with a forged signature is reported as invalid rather
//! than expired.

use std::fmt;

use authz_core::errors::{AppError, AppResult};
use authz_core::models::User;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT validation error with detailed information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
        /// Current time for reference
        current_time: DateTime<Utc>,
    },
    /// Token signature, algorithm or issuer is invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper `JWT` format or missing claims)
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenExpired {
                expired_at,
                current_time,
            } => {
                let ago = current_time.signed_duration_since(*expired_at);
                write!(
                    f,
                    "JWT token expired {} seconds ago at {}",
                    ago.num_seconds(),
                    expired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::TokenInvalid { reason } => write!(f, "JWT token is invalid: {reason}"),
            Self::TokenMalformed { details } => write!(f, "JWT token is malformed: {details}"),
        }
    }
}

impl std::error::Error for JwtValidationError {}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Unique token id
    pub jti: String,
    /// Subject: the user id
    pub sub: String,
    /// User email
    pub email: String,
    /// User display name
    pub name: String,
    /// User role
    pub role: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Granted scope
    pub scope: String,
    /// Issuer
    pub iss: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

impl Claims {
    /// Subject parsed as a user id
    ///
    /// # Errors
    ///
    /// Returns `TokenMalformed` if `sub` is not a UUID
    pub fn user_id(&self) -> Result<Uuid, JwtValidationError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtValidationError::TokenMalformed {
            details: "Subject is not a valid user id".into(),
        })
    }
}

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    /// Compact JWT
    pub token: String,
    /// Token id (`jti`)
    pub jti: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// Signs and validates access tokens with a single HS256 secret
#[derive(Clone)]
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_ttl: Duration,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Create a manager for `issuer` with the given signing secret and token lifetime
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>, access_token_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            access_token_ttl,
        }
    }

    /// Issuer placed in and required of every token
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Access token lifetime in seconds
    #[must_use]
    pub fn expires_in_secs(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }

    /// Sign an access token for `user`, bound to `client_id` and `scope`
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub fn generate_access_token(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
    ) -> AppResult<IssuedAccessToken> {
        self.generate_access_token_at(user, client_id, scope, Utc::now())
    }

    /// Sign an access token as if issued at `now`
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub fn generate_access_token_at(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
        now: DateTime<Utc>,
    ) -> AppResult<IssuedAccessToken> {
        let jti = Uuid::new_v4().to_string();
        let claims = Claims {
            jti: jti.clone(),
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            role: user.role.as_str().to_owned(),
            client_id: client_id.to_owned(),
            scope: scope.to_owned(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_token_ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign access token: {e}")))?;

        Ok(IssuedAccessToken {
            token,
            jti,
            expires_in: self.expires_in_secs(),
        })
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns a `JwtValidationError` describing why the token was rejected
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        self.validate_token_at(token, Utc::now())
    }

    /// Validate a token against the clock value `now`
    ///
    /// # Errors
    ///
    /// Returns a `JwtValidationError` describing why the token was rejected
    pub fn validate_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, JwtValidationError> {
        let claims = self.decode_token_claims(token)?;
        if claims.sub.is_empty() {
            return Err(JwtValidationError::TokenMalformed {
                details: "Token has no subject".into(),
            });
        }
        Self::check_token_expiry(&claims, now)?;
        Ok(claims)
    }

    /// Decode and verify signature, algorithm and issuer, without checking expiry
    fn decode_token_claims(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| Self::convert_jwt_error(&e))
    }

    fn check_token_expiry(claims: &Claims, now: DateTime<Utc>) -> Result<(), JwtValidationError> {
        if claims.exp <= now.timestamp() {
            let expired_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or(now);
            tracing::debug!(
                user_id = %claims.sub,
                client_id = %claims.client_id,
                "Access token expired at {}",
                expired_at.to_rfc3339()
            );
            return Err(JwtValidationError::TokenExpired {
                expired_at,
                current_time: now,
            });
        }
        Ok(())
    }

    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> JwtValidationError {
        tracing::debug!("JWT validation failed: {:?}", e.kind());
        match e.kind() {
            ErrorKind::InvalidSignature => JwtValidationError::TokenInvalid {
                reason: "Token signature verification failed".into(),
            },
            ErrorKind::InvalidAlgorithm => JwtValidationError::TokenInvalid {
                reason: "Token algorithm is not accepted".into(),
            },
            ErrorKind::InvalidIssuer => JwtValidationError::TokenInvalid {
                reason: "Token issuer is not accepted".into(),
            },
            ErrorKind::MissingRequiredClaim(claim) => JwtValidationError::TokenMalformed {
                details: format!("Token is missing required claim: {claim}"),
            },
            ErrorKind::InvalidToken => JwtValidationError::TokenMalformed {
                details: "Token format is invalid".into(),
            },
            ErrorKind::Base64(_) => JwtValidationError::TokenMalformed {
                details: "Token contains invalid base64".into(),
            },
            ErrorKind::Json(_) => JwtValidationError::TokenMalformed {
                details: "Token contains invalid claims".into(),
            },
            ErrorKind::Utf8(_) => JwtValidationError::TokenMalformed {
                details: "Token contains invalid UTF-8".into(),
            },
            _ => JwtValidationError::TokenInvalid {
                reason: "Token validation failed".into(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use authz_core::models::UserRole;

    const SECRET: &[u8] = b"test-secret-with-at-least-32-bytes!!";

    fn manager() -> AuthManager {
        AuthManager::new(SECRET, "https://auth.example.com", Duration::hours(1))
    }

    fn user() -> User {
        let mut user = User::new(
            "ada@example.com".into(),
            "hash".into(),
            "Ada Lovelace".into(),
        );
        user.role = UserRole::Admin;
        user
    }

    #[test]
    fn test_claims_round_trip() {
        let user = user();
        let issued = manager()
            .generate_access_token(&user, "client-1", "mcp")
            .unwrap();
        assert_eq!(issued.expires_in, 3600);

        let claims = manager().validate_token(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.name, "Ada Lovelace");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.client_id, "client-1");
        assert_eq!(claims.scope, "mcp");
        assert_eq!(claims.iss, "https://auth.example.com");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.user_id().unwrap(), user.id);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issued_at = Utc::now() - Duration::hours(2);
        let issued = manager()
            .generate_access_token_at(&user(), "client-1", "mcp", issued_at)
            .unwrap();
        let err = manager().validate_token(&issued.token).unwrap_err();
        assert!(matches!(err, JwtValidationError::TokenExpired { .. }));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = manager()
            .generate_access_token(&user(), "client-1", "mcp")
            .unwrap();
        let other = AuthManager::new(
            b"another-secret-with-at-least-32-bytes",
            "https://auth.example.com",
            Duration::hours(1),
        );
        assert!(matches!(
            other.validate_token(&issued.token).unwrap_err(),
            JwtValidationError::TokenInvalid { .. }
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let issued = manager()
            .generate_access_token(&user(), "client-1", "mcp")
            .unwrap();
        let other = AuthManager::new(SECRET, "https://evil.example.com", Duration::hours(1));
        assert!(matches!(
            other.validate_token(&issued.token).unwrap_err(),
            JwtValidationError::TokenInvalid { .. }
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            manager().validate_token("not-a-jwt").unwrap_err(),
            JwtValidationError::TokenMalformed { .. }
        ));
    }
}

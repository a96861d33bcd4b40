// ABOUTME: HMAC-SHA256 signed state tokens carrying a redirect target through an external login
// ABOUTME: Tokens are base64url JSON payloads with a signature and expire after ten minutes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Signed OAuth `state` values
//!
//! A state token is `BASE64URL(payload) "." BASE64URL(HMAC-SHA256(key, BASE64URL(payload)))`
//! where the payload is `{"callback", "nonce", "timestamp"}`. Decoding treats
//! every structural or signature problem as the same [`StateError::Invalid`].

use authz_core::constants::oauth::{STATE_FUTURE_SKEW_SECS, STATE_MAX_AGE_SECS};
use authz_core::errors::AppResult;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::generate_url_safe_token;

const NONCE_BYTES: usize = 16;

/// Decoded state payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    /// Where to send the user after the external login
    pub callback: String,
    /// Random value making every token unique
    pub nonce: String,
    /// Issue time (unix seconds)
    pub timestamp: i64,
}

/// Why a state token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Bad structure, encoding, JSON, or signature
    #[error("invalid state parameter")]
    Invalid,
    /// Signature valid but the token is outside its time window
    #[error("state parameter has expired")]
    Expired,
}

/// Signs and verifies state tokens with one HMAC key
pub struct OAuthStateCodec {
    key: hmac::Key,
}

impl OAuthStateCodec {
    /// Create a codec for `secret`
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Encode `callback_url` into a signed state token
    ///
    /// # Errors
    ///
    /// Returns an error if the nonce cannot be generated
    pub fn encode(&self, callback_url: &str) -> AppResult<String> {
        self.encode_at(callback_url, Utc::now())
    }

    /// Encode as if issued at `now`
    ///
    /// # Errors
    ///
    /// Returns an error if the nonce cannot be generated or serialization fails
    pub fn encode_at(&self, callback_url: &str, now: DateTime<Utc>) -> AppResult<String> {
        let payload = StatePayload {
            callback: callback_url.to_owned(),
            nonce: generate_url_safe_token(NONCE_BYTES)?,
            timestamp: now.timestamp(),
        };
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?);
        let signature = hmac::sign(&self.key, encoded.as_bytes());
        Ok(format!(
            "{encoded}.{}",
            URL_SAFE_NO_PAD.encode(signature.as_ref())
        ))
    }

    /// Verify and decode a state token
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Invalid`] for any malformed or forged token and
    /// [`StateError::Expired`] for a genuine token outside its window
    pub fn decode(&self, state: &str) -> Result<StatePayload, StateError> {
        self.decode_at(state, Utc::now())
    }

    /// Verify and decode against the clock value `now`
    ///
    /// # Errors
    ///
    /// See [`OAuthStateCodec::decode`]
    pub fn decode_at(&self, state: &str, now: DateTime<Utc>) -> Result<StatePayload, StateError> {
        let (encoded, signature) = state.split_once('.').ok_or(StateError::Invalid)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| StateError::Invalid)?;
        // ring compares in constant time
        hmac::verify(&self.key, encoded.as_bytes(), &signature).map_err(|_| StateError::Invalid)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| StateError::Invalid)?;
        let payload: StatePayload =
            serde_json::from_slice(&json).map_err(|_| StateError::Invalid)?;

        let age = now.timestamp() - payload.timestamp;
        if age > STATE_MAX_AGE_SECS {
            return Err(StateError::Expired);
        }
        if age < -STATE_FUTURE_SKEW_SECS {
            return Err(StateError::Invalid);
        }
        Ok(payload)
    }
}

/// Encode `callback_url` with `secret`
///
/// # Errors
///
/// See [`OAuthStateCodec::encode`]
pub fn encode_state(callback_url: &str, secret: &[u8]) -> AppResult<String> {
    OAuthStateCodec::new(secret).encode(callback_url)
}

/// Decode a state token signed with `secret`
///
/// # Errors
///
/// See [`OAuthStateCodec::decode`]
pub fn decode_state(state: &str, secret: &[u8]) -> Result<StatePayload, StateError> {
    OAuthStateCodec::new(secret).decode(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;

    const SECRET: &[u8] = b"state-secret-state-secret-state-secret";

    #[test]
    fn test_roundtrip_keeps_callback() {
        let state = encode_state("https://app.example/after?x=1", SECRET).unwrap();
        let payload = decode_state(&state, SECRET).unwrap();
        assert_eq!(payload.callback, "https://app.example/after?x=1");
        assert!(!payload.nonce.is_empty());
    }

    #[test]
    fn test_nonce_makes_tokens_unique() {
        let codec = OAuthStateCodec::new(SECRET);
        assert_ne!(codec.encode("/a").unwrap(), codec.encode("/a").unwrap());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let state = encode_state("/a", SECRET).unwrap();
        assert_eq!(
            decode_state(&state, b"another-secret-another-secret-xx"),
            Err(StateError::Invalid)
        );
    }

    #[test]
    fn test_time_window() {
        let codec = OAuthStateCodec::new(SECRET);
        let issued = Utc::now();
        let state = codec.encode_at("/a", issued).unwrap();

        assert!(codec.decode_at(&state, issued + Duration::seconds(600)).is_ok());
        assert_eq!(
            codec.decode_at(&state, issued + Duration::seconds(601)),
            Err(StateError::Expired)
        );
        assert!(codec.decode_at(&state, issued - Duration::seconds(60)).is_ok());
        assert_eq!(
            codec.decode_at(&state, issued - Duration::seconds(61)),
            Err(StateError::Invalid)
        );
    }
}

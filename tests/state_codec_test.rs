// ABOUTME: Integration tests for the HMAC-signed OAuth state codec
// ABOUTME: Covers tampering, key separation, the ten minute window, and the shared codec in resources
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use portfolio_authz::oauth2_client::{decode_state, encode_state, OAuthStateCodec, StateError};

const SECRET: &[u8] = b"state-secret-0123456789abcdef-0123";
const CALLBACK: &str = "https://app.example.com/after-login?tab=settings";

#[test]
fn test_free_functions_round_trip() {
    let state = encode_state(CALLBACK, SECRET).unwrap();
    let payload = decode_state(&state, SECRET).unwrap();
    assert_eq!(payload.callback, CALLBACK);
    assert!(!payload.nonce.is_empty());
    assert!((Utc::now().timestamp() - payload.timestamp).abs() <= 1);
}

#[test]
fn test_state_is_url_safe() {
    let state = encode_state(CALLBACK, SECRET).unwrap();
    assert!(state
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
}

#[test]
fn test_forged_payload_rejected() {
    let state = encode_state(CALLBACK, SECRET).unwrap();
    let (_, signature) = state.split_once('.').unwrap();

    let forged_payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "callback": "https://evil.example.com/",
            "nonce": "n",
            "timestamp": Utc::now().timestamp(),
        })
        .to_string(),
    );
    let forged = format!("{forged_payload}.{signature}");
    assert_eq!(decode_state(&forged, SECRET), Err(StateError::Invalid));
}

#[test]
fn test_malformed_tokens_rejected() {
    for state in ["", "no-separator", ".", "abc.", ".abc", "!!!.???", "a.b.c"] {
        assert_eq!(
            decode_state(state, SECRET),
            Err(StateError::Invalid),
            "{state:?}"
        );
    }
}

#[test]
fn test_signed_non_json_rejected() {
    use ring::hmac;

    let key = hmac::Key::new(hmac::HMAC_SHA256, SECRET);
    let encoded = URL_SAFE_NO_PAD.encode(b"not json at all");
    let signature = URL_SAFE_NO_PAD.encode(hmac::sign(&key, encoded.as_bytes()).as_ref());
    assert_eq!(
        decode_state(&format!("{encoded}.{signature}"), SECRET),
        Err(StateError::Invalid)
    );
}

#[test]
fn test_window_boundaries() {
    let codec = OAuthStateCodec::new(SECRET);
    let issued = Utc::now();
    let state = codec.encode_at(CALLBACK, issued).unwrap();

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

#[test]
fn test_resources_share_codec_with_jwt_secret_fallback() {
    let resources = common::create_test_resources().unwrap();
    let codec = resources.state_codec.as_ref().unwrap();

    let state = codec.encode(CALLBACK).unwrap();
    let payload = decode_state(&state, common::TEST_JWT_SECRET.as_bytes()).unwrap();
    assert_eq!(payload.callback, CALLBACK);
}

#[test]
fn test_any_single_character_tamper_fails() {
    let state = encode_state(CALLBACK, SECRET).unwrap();
    let bytes = state.as_bytes();
    for i in 0..bytes.len() {
        let mut tampered = bytes.to_vec();
        tampered[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(
            decode_state(&tampered, SECRET).is_err(),
            "tamper at byte {i} was accepted"
        );
    }
}

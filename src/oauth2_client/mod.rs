// ABOUTME: Helpers for flows where this service sends a user through a third-party login
// ABOUTME: Currently the signed, time-boxed state parameter carried across the round trip
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// HMAC-signed state parameter codec
pub mod state;

pub use state::{decode_state, encode_state, OAuthStateCodec, StateError, StatePayload};

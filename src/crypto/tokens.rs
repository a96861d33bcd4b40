// ABOUTME: Random opaque token generation backed by ring's SystemRandom
// ABOUTME: Produces authorization codes, refresh tokens, client secrets, and SHA-256 digests
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use authz_core::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

fn random_bytes(len: usize) -> AppResult<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::internal("System random number generator failed"))?;
    Ok(bytes)
}

/// `len` random bytes as base64url without padding
///
/// # Errors
///
/// Returns an error if the system RNG fails
pub fn generate_url_safe_token(len: usize) -> AppResult<String> {
    Ok(URL_SAFE_NO_PAD.encode(random_bytes(len)?))
}

/// `len` random bytes as lowercase hex
///
/// # Errors
///
/// Returns an error if the system RNG fails
pub fn generate_hex_secret(len: usize) -> AppResult<String> {
    Ok(hex::encode(random_bytes(len)?))
}

/// Lowercase hex SHA-256, used to index refresh tokens without storing them
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

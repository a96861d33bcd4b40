// ABOUTME: Cryptography module for grant secrets, credential hashing, and lookup digests
// ABOUTME: Centralizes random token generation, Argon2 client secrets, and bcrypt passwords
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Cryptographic utilities for the authorization server

/// Argon2 client secrets and bcrypt passwords
pub mod hashing;

/// Random opaque tokens and SHA-256 lookup digests
pub mod tokens;

pub use hashing::{hash_client_secret, hash_password, verify_client_secret, verify_password};
pub use tokens::{generate_hex_secret, generate_url_safe_token, sha256_hex};

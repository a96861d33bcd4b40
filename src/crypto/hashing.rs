// ABOUTME: One-way credential hashing for client secrets (Argon2) and passwords (bcrypt)
// ABOUTME: Verification runs on the blocking pool so request tasks are never stalled
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use authz_core::errors::{AppError, AppResult};
use tracing::error;

/// bcrypt hash verified for unknown accounts so their logins cost the same as real ones
static DUMMY_PASSWORD_HASH: OnceLock<String> = OnceLock::new();

/// Argon2 hash verified for unknown clients, same purpose as the password one
static DUMMY_CLIENT_SECRET_HASH: OnceLock<String> = OnceLock::new();

fn dummy_password_hash() -> String {
    DUMMY_PASSWORD_HASH
        .get_or_init(|| {
            bcrypt::hash("unknown-account-placeholder", bcrypt::DEFAULT_COST).unwrap_or_default()
        })
        .clone()
}

fn dummy_client_secret_hash() -> String {
    DUMMY_CLIENT_SECRET_HASH
        .get_or_init(|| argon2_hash("unknown-client-placeholder").unwrap_or_default())
        .clone()
}

fn argon2_hash(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// Hash a client secret with Argon2id and a random salt
///
/// # Errors
///
/// Returns an error if hashing fails or the blocking task is cancelled
pub async fn hash_client_secret(secret: &str) -> AppResult<String> {
    let secret = secret.to_owned();
    tokio::task::spawn_blocking(move || argon2_hash(&secret))
        .await
        .map_err(|e| AppError::internal(format!("Client secret hashing task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Failed to hash client secret: {e}")))
}

/// Verify a client secret against its stored Argon2 PHC string
///
/// Pass `None` for an unknown client; a dummy hash is verified instead and the
/// result is always `false`. Malformed stored hashes verify as `false`.
///
/// # Errors
///
/// Returns an error if the blocking task is cancelled
pub async fn verify_client_secret(secret: &str, stored_hash: Option<&str>) -> AppResult<bool> {
    let secret = secret.to_owned();
    let stored_hash = stored_hash.map(ToOwned::to_owned);
    let known = stored_hash.is_some();
    let matched = tokio::task::spawn_blocking(move || {
        let hash = stored_hash.unwrap_or_else(dummy_client_secret_hash);
        PasswordHash::new(&hash).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
    })
    .await
    .map_err(|e| {
        error!("Client secret verification task failed: {e}");
        AppError::internal("Client secret verification failed")
    })?;
    Ok(known && matched)
}

/// Hash a password with bcrypt
///
/// # Errors
///
/// Returns an error if hashing fails or the blocking task is cancelled
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a bcrypt hash.
///
/// Pass `None` for an unknown account; a dummy hash is verified instead and the
/// result is always `false`.
///
/// # Errors
///
/// Returns an error if the blocking task is cancelled
pub async fn verify_password(password: &str, stored_hash: Option<&str>) -> AppResult<bool> {
    let password = password.to_owned();
    let stored_hash = stored_hash.map(ToOwned::to_owned);
    let known = stored_hash.is_some();
    let matched = tokio::task::spawn_blocking(move || {
        let hash = stored_hash.unwrap_or_else(dummy_password_hash);
        bcrypt::verify(&password, &hash).unwrap_or(false)
    })
    .await
    .map_err(|e| {
        error!("Password verification task failed: {e}");
        AppError::internal("Password verification failed")
    })?;
    Ok(known && matched)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_secret_round_trip() {
        let hash = hash_client_secret("s3cret").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_client_secret("s3cret", Some(&hash)).await.unwrap());
        assert!(!verify_client_secret("wrong", Some(&hash)).await.unwrap());
        assert!(!verify_client_secret("s3cret", Some("not-a-phc-string"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_client_never_verifies() {
        assert!(dummy_client_secret_hash().starts_with("$argon2"));
        assert!(!verify_client_secret("unknown-client-placeholder", None)
            .await
            .unwrap());
    }

    // On a current-thread runtime a hash computed inline would finish during
    // the first poll of the spawned task.
    #[tokio::test(flavor = "current_thread")]
    async fn test_client_secret_hashing_leaves_runtime_free() {
        let hashing = tokio::spawn(async { hash_client_secret("s3cret").await });
        tokio::task::yield_now().await;
        assert!(!hashing.is_finished());
        assert!(hashing.await.unwrap().unwrap().starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_unknown_account_never_verifies() {
        assert!(!verify_password("anything", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_password_verification() {
        let hash = bcrypt::hash("correct horse", 4).unwrap();
        assert!(verify_password("correct horse", Some(&hash)).await.unwrap());
        assert!(!verify_password("battery staple", Some(&hash)).await.unwrap());
    }
}

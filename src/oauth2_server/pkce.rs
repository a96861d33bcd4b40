// ABOUTME: PKCE (RFC 7636) S256 challenge computation and constant-time verification
// ABOUTME: Only S256 is supported; plain and unknown methods never verify
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use authz_core::constants::oauth::PKCE_METHOD_S256;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// `BASE64URL-NOPAD(SHA256(verifier))`
#[must_use]
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Verify a code verifier against the challenge stored with an authorization code
#[must_use]
pub fn verify_code_verifier(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    if method != PKCE_METHOD_S256 || code_verifier.is_empty() || code_challenge.is_empty() {
        return false;
    }
    let computed = compute_s256_challenge(code_verifier);
    computed.as_bytes().ct_eq(code_challenge.as_bytes()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_rfc7636_vector() {
        assert_eq!(compute_s256_challenge(VERIFIER), CHALLENGE);
        assert!(verify_code_verifier(VERIFIER, CHALLENGE, "S256"));
    }

    #[test]
    fn test_mismatch_and_methods() {
        assert!(!verify_code_verifier("wrong-verifier", CHALLENGE, "S256"));
        assert!(!verify_code_verifier(VERIFIER, VERIFIER, "plain"));
        assert!(!verify_code_verifier(VERIFIER, CHALLENGE, "s256"));
        assert!(!verify_code_verifier("", CHALLENGE, "S256"));
    }
}

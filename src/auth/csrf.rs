// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Double-submit CSRF protection.
//!
//! A CSRF token is `base64url(HMAC-SHA256(secret, nonce))` over a fresh
//! 32-byte nonce from the system CSPRNG. It is handed to the browser in a
//! script-readable cookie; state-changing requests must echo the same value
//! in the `x-csrf-token` header. A cross-site page can neither read the
//! cookie nor set the header, so a matching pair proves same-origin.
//!
//! The token carries no identity and is independent of the session token.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::AuthError;

/// Request header carrying the submitted token.
pub const CSRF_HEADER: &str = "x-csrf-token";

const NONCE_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    #[error("system randomness unavailable")]
    Randomness,

    #[error("invalid HMAC key")]
    InvalidKey,
}

/// Mints and checks double-submit tokens.
#[derive(Clone)]
pub struct CsrfGuard {
    secret: Vec<u8>,
    rng: SystemRandom,
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl CsrfGuard {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            rng: SystemRandom::new(),
        }
    }

    /// Mint a new, unpredictable token. Every call returns a fresh value.
    pub fn mint(&self) -> Result<String, CsrfError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| CsrfError::Randomness)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| CsrfError::InvalidKey)?;
        mac.update(&nonce);
        let digest = mac.finalize().into_bytes();

        Ok(Base64UrlUnpadded::encode_string(&digest))
    }

    /// Check a cookie/header pair.
    ///
    /// Either side absent or empty is [`AuthError::CsrfMissing`]; present but
    /// different (exact byte comparison, no normalisation) is
    /// [`AuthError::CsrfMismatch`].
    pub fn check(&self, cookie: Option<&str>, header: Option<&str>) -> Result<(), AuthError> {
        let (cookie, header) = match (non_empty(cookie), non_empty(header)) {
            (Some(cookie), Some(header)) => (cookie, header),
            _ => return Err(AuthError::CsrfMissing),
        };

        if cookie.as_bytes().ct_eq(header.as_bytes()).into() {
            Ok(())
        } else {
            Err(AuthError::CsrfMismatch)
        }
    }
}

/// Safe verbs are exempt from the CSRF check.
pub fn is_safe_method(method: &axum::http::Method) -> bool {
    matches!(
        *method,
        axum::http::Method::GET
            | axum::http::Method::HEAD
            | axum::http::Method::OPTIONS
            | axum::http::Method::TRACE
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn guard() -> CsrfGuard {
        CsrfGuard::new(b"csrf-secret-csrf-secret-csrf-secret".to_vec())
    }

    #[test]
    fn minted_tokens_are_fresh_and_url_safe() {
        let guard = guard();
        let a = guard.mint().unwrap();
        let b = guard.mint().unwrap();

        assert_ne!(a, b);
        // 32-byte digest, unpadded base64
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn matching_pair_passes() {
        let guard = guard();
        let token = guard.mint().unwrap();
        assert!(guard.check(Some(&token), Some(&token)).is_ok());
    }

    #[test]
    fn missing_side_is_csrf_missing() {
        let guard = guard();
        let token = guard.mint().unwrap();

        assert_eq!(guard.check(None, Some(&token)), Err(AuthError::CsrfMissing));
        assert_eq!(guard.check(Some(&token), None), Err(AuthError::CsrfMissing));
        assert_eq!(guard.check(None, None), Err(AuthError::CsrfMissing));
        assert_eq!(guard.check(Some(""), Some("")), Err(AuthError::CsrfMissing));
        assert_eq!(guard.check(Some(&token), Some("")), Err(AuthError::CsrfMissing));
    }

    #[test]
    fn flipping_any_single_character_mismatches() {
        let guard = guard();
        let token = guard.mint().unwrap();

        for i in 0..token.len() {
            let mut flipped: Vec<char> = token.chars().collect();
            flipped[i] = if flipped[i] == 'A' { 'B' } else { 'A' };
            let flipped: String = flipped.into_iter().collect();

            assert_eq!(
                guard.check(Some(&token), Some(&flipped)),
                Err(AuthError::CsrfMismatch)
            );
            assert_eq!(
                guard.check(Some(&flipped), Some(&token)),
                Err(AuthError::CsrfMismatch)
            );
        }
    }

    #[test]
    fn comparison_is_exact() {
        let guard = guard();
        assert_eq!(
            guard.check(Some("AbC"), Some("abc")),
            Err(AuthError::CsrfMismatch)
        );
        assert_eq!(
            guard.check(Some("abc"), Some("abc ")),
            Err(AuthError::CsrfMismatch)
        );
    }

    #[test]
    fn different_lengths_mismatch_without_panicking() {
        let guard = guard();
        let token = guard.mint().unwrap();

        assert_eq!(
            guard.check(Some(&token), Some(&token[..token.len() - 1])),
            Err(AuthError::CsrfMismatch)
        );
        assert_eq!(
            guard.check(Some("a"), Some(&token)),
            Err(AuthError::CsrfMismatch)
        );
    }

    #[test]
    fn safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::PUT));
        assert!(!is_safe_method(&Method::PATCH));
        assert!(!is_safe_method(&Method::DELETE));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stateless session tokens.
//!
//! A session token is an HS256 JWT signed with the server secret. It carries
//! the lower-case wallet address (`sub`), issue time and expiry, and nothing
//! else: no roles, no server-side state. Authorization is always re-derived
//! from the address.
//!
//! ## Verification
//!
//! - The signature is checked before any claim is read.
//! - Expiry is enforced on every verification with millisecond precision
//!   (`now > expires_at` fails), no leeway.
//! - Every failure collapses to [`AuthError::InvalidToken`]; callers never
//!   see partial claims.
//!
//! There is no refresh: after expiry the wallet signs in again. Revoking all
//! sessions requires rotating `SESSION_SECRET`.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::address::normalize_address;
use super::AuthError;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default session lifetime (24 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted session lifetime (one year).
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const ISSUER: &str = "relational-crowdfund-gateway";

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    /// Lower-case wallet address
    sub: String,
    /// Issued at (unix seconds)
    iat: i64,
    /// Expiry (unix seconds)
    exp: i64,
    iss: String,
    /// Unique token id
    jti: String,
}

/// The identity carried across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaim {
    /// Lower-case wallet address.
    pub address: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly signed token and the claim it encodes.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claim: IdentityClaim,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,

    #[error("session TTL must be greater than zero")]
    ZeroTtl,

    #[error("session TTL must be at most {} seconds", MAX_SESSION_TTL.as_secs())]
    TtlTooLong,

    #[error("cannot issue a session for an invalid address")]
    InvalidAddress,

    #[error("failed to sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    ttl_secs: i64,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionService {
    /// Create the service. A short secret is a configuration error.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, SessionError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret);
        }
        if ttl.as_secs() == 0 {
            return Err(SessionError::ZeroTtl);
        }
        if ttl > MAX_SESSION_TTL {
            return Err(SessionError::TtlTooLong);
        }
        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| SessionError::TtlTooLong)?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand with millisecond precision.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[ISSUER]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
            ttl_secs,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a session for `address`.
    pub fn issue(&self, address: &str) -> Result<IssuedSession, SessionError> {
        self.issue_at(address, Utc::now())
    }

    pub fn issue_at(&self, address: &str, now: DateTime<Utc>) -> Result<IssuedSession, SessionError> {
        let address = normalize_address(address).ok_or(SessionError::InvalidAddress)?;
        let iat = now.timestamp();
        let exp = iat.saturating_add(self.ttl_secs);

        let claims = SessionClaims {
            sub: address.clone(),
            iat,
            exp,
            iss: ISSUER.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedSession {
            token,
            claim: IdentityClaim {
                address,
                issued_at: timestamp(iat),
                expires_at: timestamp(exp),
            },
        })
    }

    /// Verify a token and return its identity claim.
    pub fn verify(&self, token: &str) -> Result<IdentityClaim, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaim, AuthError> {
        let data = decode::<SessionClaims>(token.trim(), &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                AuthError::InvalidToken
            })?;
        let claims = data.claims;

        let expires_at = timestamp(claims.exp);
        if now > expires_at {
            return Err(AuthError::InvalidToken);
        }

        // Only tokens this service minted get here, but the subject is
        // re-normalised rather than trusted verbatim.
        let address = normalize_address(&claims.sub).ok_or(AuthError::InvalidToken)?;

        Ok(IdentityClaim {
            address,
            issued_at: timestamp(claims.iat),
            expires_at,
        })
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

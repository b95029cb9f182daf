// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signature verification (EIP-191 `personal_sign`).
//!
//! ## Challenge
//!
//! The server owns the challenge text. A client fetches it from
//! `GET /v1/auth/challenge`, signs it with its wallet and posts it back with
//! the signature. Verification rebuilds the expected message for the
//! claimed address and the current time window and refuses anything else, so
//! a signature captured in one window cannot be replayed indefinitely.
//!
//! ## Outcomes
//!
//! - recovery fails or the message is not the expected challenge →
//!   [`SignatureError::InvalidSignature`]
//! - recovery succeeds for another address → [`SignatureError::AddressMismatch`]
//! - allow-list configured and signer absent → [`SignatureError::NotWhitelisted`]
//!   (checked separately in [`SignatureVerifier::ensure_allowed`])

use std::collections::HashSet;
use std::time::Duration;

use alloy::primitives::{Address, Signature};
use chrono::{DateTime, TimeZone, Utc};

use super::address::{format_address, normalize_address};
use super::AuthError;

/// 65-byte `r || s || v` signature, hex encoded.
const SIGNATURE_HEX_LEN: usize = 130;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("signature recovered to {recovered}")]
    AddressMismatch { recovered: String },

    #[error("{address} is not on the wallet allow-list")]
    NotWhitelisted { address: String },
}

impl From<SignatureError> for AuthError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidSignature => AuthError::InvalidSignature,
            SignatureError::AddressMismatch { .. } => AuthError::AddressMismatch,
            SignatureError::NotWhitelisted { .. } => AuthError::NotWhitelisted,
        }
    }
}

/// A signer whose wallet signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSigner {
    /// Lower-case recovered address.
    pub address: String,
}

/// Server-side challenge template.
#[derive(Debug, Clone)]
pub struct ChallengeTemplate {
    app_name: String,
    window: Duration,
}

/// A challenge ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub address: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

impl ChallengeTemplate {
    pub fn new(app_name: impl Into<String>, window: Duration) -> Self {
        Self {
            app_name: app_name.into(),
            window: if window.is_zero() {
                Duration::from_secs(1)
            } else {
                window
            },
        }
    }

    fn window_secs(&self) -> i64 {
        i64::try_from(self.window.as_secs().max(1)).unwrap_or(i64::MAX)
    }

    fn window_index(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(self.window_secs())
    }

    /// Exact text for `address` (already normalised) in window `index`.
    pub fn render(&self, address: &str, index: i64) -> String {
        format!(
            "{app} wants you to sign in with your Ethereum account:\n\
             {address}\n\
             \n\
             Sign this message to prove you own this wallet. \
             This request will not trigger a blockchain transaction or cost any gas.\n\
             \n\
             Window: {index}",
            app = self.app_name,
        )
    }

    /// Build the challenge a client must sign right now.
    ///
    /// Returns `None` when `address` is not a valid wallet address.
    pub fn issue(&self, address: &str, now: DateTime<Utc>) -> Option<Challenge> {
        let address = normalize_address(address)?;
        let index = self.window_index(now);
        let expires_secs = (index + 2) * self.window_secs();

        Some(Challenge {
            message: self.render(&address, index),
            expires_at: Utc
                .timestamp_opt(expires_secs, 0)
                .single()
                .unwrap_or(now),
            address,
        })
    }

    /// Whether `message` is the challenge for `address` in the current or
    /// immediately preceding window.
    pub fn accepts(&self, address: &str, message: &str, now: DateTime<Utc>) -> bool {
        let index = self.window_index(now);
        [index, index - 1]
            .iter()
            .any(|i| self.render(address, *i) == message)
    }
}

/// Recovers and checks wallet signatures.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    template: ChallengeTemplate,
    allowlist: Option<HashSet<String>>,
}

impl SignatureVerifier {
    /// `allowlist` entries are normalised here; `None` disables the check.
    pub fn new(template: ChallengeTemplate, allowlist: Option<Vec<String>>) -> Self {
        let allowlist = allowlist.map(|entries| {
            entries
                .iter()
                .filter_map(|entry| normalize_address(entry))
                .collect()
        });
        Self {
            template,
            allowlist,
        }
    }

    pub fn template(&self) -> &ChallengeTemplate {
        &self.template
    }

    /// Verify that `signature` over `message` was produced by
    /// `claimed_address`, and that `message` is the current challenge.
    pub fn verify(
        &self,
        claimed_address: &str,
        signature: &str,
        message: &str,
    ) -> Result<VerifiedSigner, SignatureError> {
        self.verify_at(claimed_address, signature, message, Utc::now())
    }

    pub fn verify_at(
        &self,
        claimed_address: &str,
        signature: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedSigner, SignatureError> {
        let claimed = normalize_address(claimed_address).ok_or(SignatureError::InvalidSignature)?;

        if !self.template.accepts(&claimed, message, now) {
            tracing::debug!(address = %claimed, "Signed message is not the expected challenge");
            return Err(SignatureError::InvalidSignature);
        }

        let recovered = recover_signer(message, signature)?;
        let recovered = format_address(&recovered);

        if recovered != claimed {
            return Err(SignatureError::AddressMismatch { recovered });
        }

        Ok(VerifiedSigner { address: recovered })
    }

    /// Allow-list gate. Always passes when no allow-list is configured.
    pub fn ensure_allowed(&self, signer: &VerifiedSigner) -> Result<(), SignatureError> {
        match &self.allowlist {
            Some(list) if !list.contains(&signer.address) => Err(SignatureError::NotWhitelisted {
                address: signer.address.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Recover the EIP-191 signer of `message`.
fn recover_signer(message: &str, signature: &str) -> Result<Address, SignatureError> {
    let hex = signature.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.len() != SIGNATURE_HEX_LEN {
        return Err(SignatureError::InvalidSignature);
    }

    let bytes = alloy::hex::decode(hex).map_err(|_| SignatureError::InvalidSignature)?;
    let signature = Signature::from_raw(&bytes).map_err(|_| SignatureError::InvalidSignature)?;

    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|_| SignatureError::InvalidSignature)
}

#[cfg(test)]
pub(crate) mod test_support {
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    use crate::auth::address::format_address;

    /// Deterministic test wallet derived from a one-byte seed.
    pub fn wallet(seed: u8) -> PrivateKeySigner {
        PrivateKeySigner::from_slice(&[seed; 32]).expect("valid test key")
    }

    pub fn wallet_address(wallet: &PrivateKeySigner) -> String {
        format_address(&wallet.address())
    }

    pub fn sign(wallet: &PrivateKeySigner, message: &str) -> String {
        let signature = wallet
            .sign_message_sync(message.as_bytes())
            .expect("signing succeeds");
        format!("0x{}", alloy::hex::encode(signature.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn verifier(allowlist: Option<Vec<String>>) -> SignatureVerifier {
        SignatureVerifier::new(
            ChallengeTemplate::new("Relational Crowdfund", Duration::from_secs(300)),
            allowlist,
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000, 0).unwrap()
    }

    #[test]
    fn valid_signature_over_challenge_verifies() {
        let wallet = wallet(7);
        let address = wallet_address(&wallet);
        let v = verifier(None);
        let challenge = v.template().issue(&address, now()).unwrap();
        let signature = sign(&wallet, &challenge.message);

        let signer = v.verify_at(&address, &signature, &challenge.message, now()).unwrap();
        assert_eq!(signer.address, address);
    }

    #[test]
    fn claimed_address_case_does_not_matter() {
        let wallet = wallet(7);
        let address = wallet_address(&wallet);
        let v = verifier(None);
        let challenge = v.template().issue(&address, now()).unwrap();
        let signature = sign(&wallet, &challenge.message);

        let upper = format!("0x{}", address[2..].to_uppercase());
        let signer = v.verify_at(&upper, &signature, &challenge.message, now()).unwrap();
        assert_eq!(signer.address, address);

        // the checksummed form renders the same challenge
        let checksummed = wallet.address().to_checksum(None);
        let signer = v.verify_at(&checksummed, &signature, &challenge.message, now()).unwrap();
        assert_eq!(signer.address, address);
    }

    #[test]
    fn signature_from_another_wallet_is_address_mismatch() {
        let owner = wallet(7);
        let attacker = wallet(8);
        let address = wallet_address(&owner);
        let v = verifier(None);
        let challenge = v.template().issue(&address, now()).unwrap();
        let signature = sign(&attacker, &challenge.message);

        let err = v.verify_at(&address, &signature, &challenge.message, now()).unwrap_err();
        assert_eq!(
            err,
            SignatureError::AddressMismatch {
                recovered: wallet_address(&attacker)
            }
        );
    }

    #[test]
    fn signature_over_different_message_never_verifies() {
        let wallet = wallet(7);
        let address = wallet_address(&wallet);
        let v = verifier(None);
        let challenge = v.template().issue(&address, now()).unwrap();

        // signed something else, presented with the real challenge
        let signature = sign(&wallet, "gm");
        let err = v.verify_at(&address, &signature, &challenge.message, now()).unwrap_err();
        assert!(matches!(
            err,
            SignatureError::AddressMismatch { .. } | SignatureError::InvalidSignature
        ));

        // signed something else, presented with that message
        let err = v.verify_at(&address, &signature, "gm", now()).unwrap_err();
        assert_eq!(err, SignatureError::InvalidSignature);
    }

    #[test]
    fn previous_window_is_accepted_older_is_not() {
        let wallet = wallet(7);
        let address = wallet_address(&wallet);
        let v = verifier(None);
        let issued_at = now();
        let challenge = v.template().issue(&address, issued_at).unwrap();
        let signature = sign(&wallet, &challenge.message);

        let next_window = issued_at + chrono::Duration::seconds(300);
        assert!(v.verify_at(&address, &signature, &challenge.message, next_window).is_ok());

        let two_windows_later = issued_at + chrono::Duration::seconds(600);
        assert_eq!(
            v.verify_at(&address, &signature, &challenge.message, two_windows_later)
                .unwrap_err(),
            SignatureError::InvalidSignature
        );
    }

    #[test]
    fn challenge_for_other_address_is_rejected() {
        let wallet = wallet(7);
        let other = wallet_address(&super::test_support::wallet(9));
        let v = verifier(None);
        let challenge = v.template().issue(&other, now()).unwrap();
        let signature = sign(&wallet, &challenge.message);

        let err = v
            .verify_at(&wallet_address(&wallet), &signature, &challenge.message, now())
            .unwrap_err();
        assert_eq!(err, SignatureError::InvalidSignature);
    }

    #[test]
    fn malformed_signatures_are_invalid() {
        let wallet = wallet(7);
        let address = wallet_address(&wallet);
        let v = verifier(None);
        let challenge = v.template().issue(&address, now()).unwrap();

        let bad_signatures = vec![
            String::new(),
            "0x".to_string(),
            "0x1234".to_string(),
            "zz".repeat(65),
            format!("0x{}", "00".repeat(65)),
        ];
        for bad in &bad_signatures {
            assert_eq!(
                v.verify_at(&address, bad, &challenge.message, now()).unwrap_err(),
                SignatureError::InvalidSignature,
                "{bad:?}"
            );
        }
    }

    #[test]
    fn malformed_claimed_address_is_invalid() {
        let v = verifier(None);
        assert_eq!(
            v.verify_at("0xnope", "0x00", "msg", now()).unwrap_err(),
            SignatureError::InvalidSignature
        );
    }

    #[test]
    fn allowlist_is_a_separate_gate() {
        let allowed = wallet(7);
        let stranger = wallet(8);
        let v = verifier(Some(vec![wallet_address(&allowed).to_uppercase().replace("0X", "0x")]));

        let ok = VerifiedSigner {
            address: wallet_address(&allowed),
        };
        assert!(v.ensure_allowed(&ok).is_ok());

        let denied = VerifiedSigner {
            address: wallet_address(&stranger),
        };
        assert!(matches!(
            v.ensure_allowed(&denied),
            Err(SignatureError::NotWhitelisted { .. })
        ));
    }

    #[test]
    fn no_allowlist_allows_everyone() {
        let v = verifier(None);
        let signer = VerifiedSigner {
            address: wallet_address(&wallet(3)),
        };
        assert!(v.ensure_allowed(&signer).is_ok());
    }

    #[test]
    fn challenge_expiry_covers_grace_window() {
        let v = verifier(None);
        let challenge = v.template().issue(&wallet_address(&wallet(1)), now()).unwrap();
        let index = now().timestamp() / 300;
        assert_eq!(challenge.expires_at.timestamp(), (index + 2) * 300);
        assert!(challenge.message.ends_with(&format!("Window: {index}")));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet-signature login, stateless sessions and double-submit CSRF for the
//! crowdfunding gateway.
//!
//! ## Auth Flow
//!
//! 1. Frontend fetches the challenge for its wallet (`GET /v1/auth/challenge`)
//! 2. The wallet signs it with `personal_sign`
//! 3. Gateway:
//!    - Recovers the signer and compares it with the claimed address
//!    - Applies the optional wallet allow-list
//!    - Issues an HttpOnly session cookie and a readable CSRF cookie
//! 4. State-changing calls send the session cookie (or a bearer token) plus
//!    the CSRF cookie echoed in `x-csrf-token`
//!
//! ## Security
//!
//! - Addresses are compared case-insensitively everywhere
//! - Sessions carry only the address; authorization is re-derived per request
//! - Session expiry is enforced on every verification, with no leeway

pub mod address;
pub mod cookies;
pub mod csrf;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod session;
pub mod signature;

pub use cookies::CookiePolicy;
pub use csrf::CsrfGuard;
pub use error::AuthError;
pub use extractor::{Credentials, Session};
pub use session::{IdentityClaim, SessionService};
pub use signature::{SignatureVerifier, VerifiedSigner};

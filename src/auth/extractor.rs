// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for session and CSRF credentials.
//!
//! Use the `Session` extractor in handlers that only need an identity:
//!
//! ```rust,ignore
//! async fn my_handler(Session(claim): Session) -> impl IntoResponse {
//!     // claim.address is the verified lower-case wallet address
//! }
//! ```
//!
//! Privileged mutations take [`Credentials`] instead and hand them to the
//! policy composer, which decides the order the gates run in.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::cookies::{read_cookie, CSRF_COOKIE, SESSION_COOKIE};
use super::csrf::CSRF_HEADER;
use super::session::IdentityClaim;
use super::AuthError;
use crate::error::ApiError;
use crate::state::AppState;

/// Session token from the `session` cookie, else from
/// `Authorization: Bearer <token>`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, SESSION_COOKIE).or_else(|| bearer_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Raw, unverified credentials carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub session_token: Option<String>,
    pub csrf_cookie: Option<String>,
    pub csrf_header: Option<String>,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            session_token: session_token(headers),
            csrf_cookie: read_cookie(headers, CSRF_COOKIE),
            csrf_header: headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Credentials {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Extractor for a verified session.
///
/// Rejects with 401 `missing_session` when no token is present and
/// `invalid_token` when it does not verify.
pub struct Session(pub IdentityClaim);

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AuthError::MissingSession)?;
        let claim = state.sessions.verify(&token)?;
        Ok(Session(claim))
    }
}

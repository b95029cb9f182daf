// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and request-integrity errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ErrorKind};

/// Gate failures raised by the auth layer.
///
/// Messages are deliberately coarse: they tell the client which gate failed,
/// never why a signature or token was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session cookie or bearer token present
    MissingSession,
    /// Session token failed signature, structure or expiry checks
    InvalidToken,
    /// Wallet signature malformed, unrecoverable, or over the wrong message
    InvalidSignature,
    /// Signature recovered to a different address than claimed
    AddressMismatch,
    /// Signer is not on the configured wallet allow-list
    NotWhitelisted,
    /// CSRF cookie or header missing on a state-changing request
    CsrfMissing,
    /// CSRF cookie and header differ
    CsrfMismatch,
    /// Caller is not the on-chain owner of the project
    NotProjectOwner,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingSession => "missing_session",
            AuthError::InvalidToken => "invalid_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::AddressMismatch => "address_mismatch",
            AuthError::NotWhitelisted => "not_whitelisted",
            AuthError::CsrfMissing => "csrf_missing",
            AuthError::CsrfMismatch => "csrf_mismatch",
            AuthError::NotProjectOwner => "not_project_owner",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingSession
            | AuthError::InvalidToken
            | AuthError::InvalidSignature
            | AuthError::AddressMismatch
            | AuthError::NotWhitelisted => ErrorKind::Authentication,
            AuthError::CsrfMissing | AuthError::CsrfMismatch | AuthError::NotProjectOwner => {
                ErrorKind::Authorization
            }
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingSession => write!(f, "Authentication required"),
            AuthError::InvalidToken => write!(f, "Session is invalid or has expired"),
            AuthError::InvalidSignature => write!(f, "Wallet signature is invalid"),
            AuthError::AddressMismatch => {
                write!(f, "Signature does not match the claimed address")
            }
            AuthError::NotWhitelisted => write!(f, "Wallet is not authorized to sign in"),
            AuthError::CsrfMissing => write!(f, "CSRF token missing"),
            AuthError::CsrfMismatch => write!(f, "CSRF token mismatch"),
            AuthError::NotProjectOwner => {
                write!(f, "Only the on-chain project owner can perform this action")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.kind(), err.to_string()).with_code(err.error_code())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

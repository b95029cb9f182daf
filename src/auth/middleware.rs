// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CSRF bootstrap middleware for Axum.
//!
//! Safe requests under `/v1` that arrive without a CSRF cookie get one
//! minted on the response, so a browser always holds a token before its
//! first state-changing call. Existing cookies are left alone; the token
//! stays stable until logout clears it.

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::Response,
};

use super::cookies::{read_cookie, CSRF_COOKIE};
use super::csrf::is_safe_method;
use crate::state::AppState;

/// Mint a CSRF cookie on safe requests that lack one.
pub async fn ensure_csrf_cookie(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let needs_token =
        is_safe_method(request.method()) && read_cookie(request.headers(), CSRF_COOKIE).is_none();

    let mut response = next.run(request).await;
    if !needs_token || sets_csrf_cookie(&response) {
        return response;
    }

    match state.csrf.mint() {
        Ok(token) => {
            response
                .headers_mut()
                .append(SET_COOKIE, state.cookies.csrf_cookie(&token));
        }
        Err(e) => tracing::error!(error = %e, "Failed to mint CSRF token"),
    }
    response
}

/// Whether the handler already set the CSRF cookie itself.
fn sets_csrf_cookie(response: &Response) -> bool {
    let prefix = format!("{CSRF_COOKIE}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}

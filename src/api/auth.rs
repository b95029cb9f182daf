// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::{
    auth::{
        cookies::{read_cookie, CSRF_COOKIE},
        Session,
    },
    error::{ApiError, ErrorBody},
    models::{
        ChallengeQuery, ChallengeResponse, CsrfResponse, LoginRequest, LoginResponse,
        LogoutResponse, SessionResponse,
    },
    policy,
    ratelimit::middleware::ClientIp,
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/auth/challenge",
    params(ChallengeQuery),
    tag = "Auth",
    responses(
        (status = 200, body = ChallengeResponse),
        (status = 400, body = ErrorBody)
    )
)]
pub async fn challenge(
    State(state): State<AppState>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let address = query
        .address
        .ok_or_else(|| ApiError::validation("address is required"))?;
    let challenge = state
        .signatures
        .template()
        .issue(&address, Utc::now())
        .ok_or_else(|| ApiError::validation("address must be a 0x-prefixed 20-byte hex address"))?;

    Ok(Json(ChallengeResponse {
        message: challenge.message,
        address: challenge.address,
        expires_at: challenge.expires_at,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Session and CSRF cookies set", body = LoginResponse),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
        (status = 429, body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = body
        .map(|Json(request)| request)
        .map_err(|e| ApiError::validation(e.body_text()));
    let outcome = policy::login(&state, ip, request).await?;

    let cookies = AppendHeaders([
        (SET_COOKIE, state.cookies.session_cookie(&outcome.session.token)),
        (SET_COOKIE, state.cookies.csrf_cookie(&outcome.csrf_token)),
    ]);
    let body = LoginResponse {
        address: outcome.session.claim.address,
        csrf_token: outcome.csrf_token,
        expires_at: outcome.session.claim.expires_at,
    };

    Ok((cookies, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Cookies cleared", body = LogoutResponse))
)]
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookies = AppendHeaders([
        (SET_COOKIE, state.cookies.clear_session_cookie()),
        (SET_COOKIE, state.cookies.clear_csrf_cookie()),
    ]);
    (cookies, Json(LogoutResponse { success: true })).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    tag = "Auth",
    responses(
        (status = 200, body = SessionResponse),
        (status = 401, body = ErrorBody)
    )
)]
pub async fn session(Session(claim): Session) -> Json<SessionResponse> {
    Json(SessionResponse {
        address: claim.address,
        expires_at: claim.expires_at,
    })
}

#[utoipa::path(
    get,
    path = "/v1/auth/csrf",
    tag = "Auth",
    responses((status = 200, body = CsrfResponse))
)]
pub async fn csrf(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(existing) = read_cookie(&headers, CSRF_COOKIE) {
        return Ok(Json(CsrfResponse {
            csrf_token: existing,
        })
        .into_response());
    }

    let token = state.csrf.mint().map_err(ApiError::internal)?;
    let cookie = AppendHeaders([(SET_COOKIE, state.cookies.csrf_cookie(&token))]);
    Ok((cookie, Json(CsrfResponse { csrf_token: token })).into_response())
}

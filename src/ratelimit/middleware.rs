// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rate-limit middleware and client address resolution.
//!
//! `general_api_limit` wraps everything under `/v1`; `rpc_proxy_limit`
//! wraps `/rpc`. The auth and wallet-mutation policies are consumed inside
//! the policy composer, where the caller's identity is known.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::{derive_key, Policy};
use crate::auth::extractor::session_token;
use crate::error::ApiError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the caller's address.
///
/// With `trusted_proxies == 0` only the socket peer counts. Otherwise the
/// client is the entry `trusted_proxies` positions from the right of
/// `X-Forwarded-For`; entries further left are client-controlled.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: usize) -> Option<IpAddr> {
    if trusted_proxies == 0 {
        return peer;
    }

    let forwarded: Vec<&str> = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    forwarded
        .len()
        .checked_sub(trusted_proxies)
        .and_then(|index| forwarded.get(index))
        .and_then(|entry| entry.parse().ok())
        .or(peer)
}

fn peer_ip(extensions: &axum::http::Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// The resolved client address, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(
            &parts.headers,
            peer_ip(&parts.extensions),
            state.config.trusted_proxy_count,
        )))
    }
}

/// Consume one unit of `policy` for `key`, or fail with 429.
pub fn enforce(state: &AppState, policy: Policy, key: &str) -> Result<(), ApiError> {
    let decision = state.rate_limiter.consume(policy, key);
    if decision.allowed {
        return Ok(());
    }
    warn!(policy = %policy, key = %key, retry_after = ?decision.retry_after, "Rate limit exceeded");
    Err(ApiError::rate_limited(decision.retry_after))
}

/// General API policy. Keyed by session address when the request carries a
/// valid session, else by client address.
pub async fn general_api_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(
        request.headers(),
        peer_ip(request.extensions()),
        state.config.trusted_proxy_count,
    );
    let identity = session_token(request.headers())
        .and_then(|token| state.sessions.verify(&token).ok())
        .map(|claim| claim.address);
    let key = derive_key(identity.as_deref(), ip);

    match enforce(&state, Policy::GeneralApi, &key) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

/// RPC passthrough policy. Keyed by client address only; the passthrough
/// never reads cookies.
pub async fn rpc_proxy_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(
        request.headers(),
        peer_ip(request.extensions()),
        state.config.trusted_proxy_count,
    );
    let key = derive_key(None, ip);

    match enforce(&state, Policy::RpcProxy, &key) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

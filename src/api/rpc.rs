// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Bytes,
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};

use crate::{
    error::{ApiError, ErrorBody},
    state::AppState,
};

/// Read-only JSON-RPC passthrough.
///
/// Unauthenticated and cookie-free. The request body is checked against the
/// method allow-list and size caps before it is forwarded.
#[utoipa::path(
    post,
    path = "/rpc",
    request_body(content = String, description = "JSON-RPC 2.0 request or batch", content_type = "application/json"),
    tag = "RPC",
    responses(
        (status = 200, description = "Provider response, verbatim"),
        (status = 400, body = ErrorBody),
        (status = 429, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
pub async fn proxy(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let upstream = state.rpc_proxy.forward(body).await?;
    Ok(([(CONTENT_TYPE, "application/json")], upstream).into_response())
}

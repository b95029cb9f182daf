// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC passthrough.
//!
//! Forwards read-only JSON-RPC 2.0 calls (single or batch) to the configured
//! endpoint so browsers never need the raw provider URL. Each forwarded
//! request is built fresh and carries only `content-type`; client cookies and
//! auth headers never reach the provider.

use std::time::Duration;

use axum::body::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, ClientBuilder};
use serde_json::Value;
use url::Url;

use crate::error::ApiError;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Most calls accepted in one batch.
pub const MAX_BATCH_SIZE: usize = 20;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Methods that never change chain state or touch node-held keys.
pub const ALLOWED_METHODS: &[&str] = &[
    "eth_call",
    "eth_chainId",
    "eth_blockNumber",
    "eth_getBalance",
    "eth_getCode",
    "eth_getLogs",
    "eth_getStorageAt",
    "eth_getBlockByNumber",
    "eth_getBlockByHash",
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
    "eth_getTransactionCount",
    "eth_estimateGas",
    "eth_gasPrice",
    "eth_maxPriorityFeePerGas",
    "eth_feeHistory",
    "net_version",
    "web3_clientVersion",
];

#[derive(Debug, thiserror::Error)]
pub enum RpcProxyError {
    #[error("request body exceeds {MAX_BODY_BYTES} bytes")]
    BodyTooLarge,

    #[error("invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    #[error("batch exceeds {MAX_BATCH_SIZE} calls")]
    BatchTooLarge,

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl From<RpcProxyError> for ApiError {
    fn from(err: RpcProxyError) -> Self {
        match err {
            RpcProxyError::BodyTooLarge => {
                ApiError::validation(err.to_string()).with_code("rpc_body_too_large")
            }
            RpcProxyError::InvalidRequest(_) => {
                ApiError::validation(err.to_string()).with_code("rpc_invalid_request")
            }
            RpcProxyError::BatchTooLarge => {
                ApiError::validation(err.to_string()).with_code("rpc_batch_too_large")
            }
            RpcProxyError::MethodNotAllowed(_) => {
                ApiError::validation(err.to_string()).with_code("rpc_method_not_allowed")
            }
            RpcProxyError::Client(_) => ApiError::internal(err),
            RpcProxyError::Upstream(_) => ApiError::upstream(err),
        }
    }
}

/// Forwards vetted JSON-RPC payloads to one endpoint.
#[derive(Clone)]
pub struct RpcProxy {
    client: Client,
    endpoint: Url,
}

impl RpcProxy {
    pub fn new(endpoint: Url) -> Result<Self, RpcProxyError> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .timeout(FORWARD_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RpcProxyError::Client(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    /// Validate `body` and forward it; returns the provider's JSON response.
    pub async fn forward(&self, body: Bytes) -> Result<Bytes, RpcProxyError> {
        let calls = validate_payload(&body)?;
        tracing::debug!(calls, "Forwarding JSON-RPC request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RpcProxyError::Upstream(sanitize(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcProxyError::Upstream(format!("provider returned {status}")));
        }

        response
            .bytes()
            .await
            .map_err(|e| RpcProxyError::Upstream(sanitize(&e)))
    }
}

/// Check size, shape and methods. Returns the number of calls.
pub fn validate_payload(body: &[u8]) -> Result<usize, RpcProxyError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(RpcProxyError::BodyTooLarge);
    }

    let payload: Value =
        serde_json::from_slice(body).map_err(|e| RpcProxyError::InvalidRequest(e.to_string()))?;

    match &payload {
        Value::Object(_) => {
            check_call(&payload)?;
            Ok(1)
        }
        Value::Array(calls) => {
            if calls.is_empty() {
                return Err(RpcProxyError::InvalidRequest("empty batch".to_string()));
            }
            if calls.len() > MAX_BATCH_SIZE {
                return Err(RpcProxyError::BatchTooLarge);
            }
            calls.iter().try_for_each(check_call)?;
            Ok(calls.len())
        }
        _ => Err(RpcProxyError::InvalidRequest(
            "expected an object or an array".to_string(),
        )),
    }
}

fn check_call(call: &Value) -> Result<(), RpcProxyError> {
    if call.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(RpcProxyError::InvalidRequest(
            "jsonrpc must be \"2.0\"".to_string(),
        ));
    }

    let method = call
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcProxyError::InvalidRequest("missing method".to_string()))?;

    if !ALLOWED_METHODS.contains(&method) {
        return Err(RpcProxyError::MethodNotAllowed(method.to_string()));
    }

    Ok(())
}

fn sanitize(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused or unreachable".to_string()
    } else if error.is_timeout() {
        "connection timed out".to_string()
    } else if error.is_body() || error.is_decode() {
        "response body error".to_string()
    } else {
        "network error".to_string()
    }
}

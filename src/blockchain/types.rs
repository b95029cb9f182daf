// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain types and errors.

use std::time::Duration;

use alloy::primitives::Address;
use url::Url;

/// Connection settings for the crowdfunding contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSettings {
    /// JSON-RPC endpoint (http or https)
    pub rpc_url: Url,
    /// Deployed crowdfunding contract
    pub contract_address: Address,
    /// Upper bound on every contract read
    pub timeout: Duration,
}

/// Errors that can occur while reading chain state.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Chain read timed out after {0:?}")]
    Timeout(Duration),
}

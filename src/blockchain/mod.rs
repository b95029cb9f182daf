// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain integration for the crowdfunding contract.
//!
//! This module provides:
//! - Read-only contract bindings and a JSON-RPC client
//! - The on-chain ownership verifier used by privileged mutations
//! - The read-only JSON-RPC passthrough served at `/rpc`

pub mod client;
pub mod contract;
pub mod ownership;
pub mod rpc_proxy;
pub mod types;

pub use client::ChainClient;
pub use ownership::{parse_project_id, OwnerLookup, OwnershipVerifier, ProjectRegistry};
pub use rpc_proxy::{RpcProxy, RpcProxyError};
pub use types::{ChainError, ChainSettings};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # On-chain Ownership
//!
//! The contract is the only source of truth for who owns a project. Every
//! check performs a fresh read; owner values are never cached, so an
//! ownership transfer takes effect on the next request.
//!
//! The public checks fail soft: a malformed id, an unreachable or slow RPC
//! endpoint and a zero owner all come back as `None` / `false`, never as an
//! error and never as `true`. [`OwnershipVerifier::lookup`] keeps the
//! distinction so the mutation flow can tell "not found" from "chain down".

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tracing::warn;

use super::types::ChainError;
use crate::auth::address::{addresses_match, format_address, is_zero_address};

/// Read access to the crowdfunding contract.
///
/// Implemented by [`ChainClient`](super::ChainClient) and by in-test
/// registries.
#[async_trait]
pub trait ProjectRegistry: Send + Sync {
    /// Owner recorded for `project_id`; the zero address means no project.
    async fn project_owner(&self, project_id: U256) -> Result<Address, ChainError>;

    /// Latest block number, used as a liveness probe.
    async fn block_number(&self) -> Result<u64, ChainError>;
}

/// Outcome of a single ownership read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerLookup {
    /// Lower-case owner address.
    Owner(String),
    /// The contract reports no such project (zero owner).
    NotFound,
    /// The id is not an unsigned 256-bit decimal integer.
    InvalidId,
    /// The chain could not be read within the timeout.
    Unavailable,
}

/// Parse a project id as the contract's `uint256`.
pub fn parse_project_id(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

#[derive(Clone)]
pub struct OwnershipVerifier {
    registry: Arc<dyn ProjectRegistry>,
    timeout: Duration,
}

impl OwnershipVerifier {
    pub fn new(registry: Arc<dyn ProjectRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Read the current owner of `project_id`.
    pub async fn lookup(&self, project_id: &str) -> OwnerLookup {
        let Some(id) = parse_project_id(project_id) else {
            return OwnerLookup::InvalidId;
        };

        match tokio::time::timeout(self.timeout, self.registry.project_owner(id)).await {
            Ok(Ok(owner)) if is_zero_address(&owner) => OwnerLookup::NotFound,
            Ok(Ok(owner)) => OwnerLookup::Owner(format_address(&owner)),
            Ok(Err(e)) => {
                warn!(project_id = %id, error = %e, "Ownership read failed");
                OwnerLookup::Unavailable
            }
            Err(_) => {
                warn!(project_id = %id, timeout = ?self.timeout, "Ownership read timed out");
                OwnerLookup::Unavailable
            }
        }
    }

    /// Current owner, or `None` on any failure.
    pub async fn owner_of(&self, project_id: &str) -> Option<String> {
        match self.lookup(project_id).await {
            OwnerLookup::Owner(owner) => Some(owner),
            _ => None,
        }
    }

    /// Whether the project exists on-chain (non-zero owner).
    pub async fn exists(&self, project_id: &str) -> bool {
        self.owner_of(project_id).await.is_some()
    }

    /// Whether `address` is the current on-chain owner. Case-insensitive;
    /// `false` on any failure.
    pub async fn is_owner(&self, project_id: &str, address: &str) -> bool {
        match self.owner_of(project_id).await {
            Some(owner) => addresses_match(&owner, address),
            None => false,
        }
    }

    /// Liveness probe for health checks, bounded by the same timeout.
    pub async fn probe(&self) -> Result<u64, ChainError> {
        tokio::time::timeout(self.timeout, self.registry.block_number())
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?
    }
}

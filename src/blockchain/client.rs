// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC client for the crowdfunding contract.

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};
use async_trait::async_trait;

use super::contract::ICrowdfund;
use super::ownership::ProjectRegistry;
use super::types::{ChainError, ChainSettings};

/// HTTP provider type (with the default fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Read-only client bound to one contract deployment.
///
/// Built once at startup and shared; it holds no per-request state and
/// caches no chain values.
pub struct ChainClient {
    settings: ChainSettings,
    contract: ICrowdfund::ICrowdfundInstance<HttpProvider>,
}

impl ChainClient {
    pub fn new(settings: ChainSettings) -> Result<Self, ChainError> {
        if !matches!(settings.rpc_url.scheme(), "http" | "https") {
            return Err(ChainError::InvalidRpcUrl(settings.rpc_url.to_string()));
        }

        let provider = ProviderBuilder::new().connect_http(settings.rpc_url.clone());
        let contract = ICrowdfund::new(settings.contract_address, provider);

        Ok(Self { settings, contract })
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }
}

#[async_trait]
impl ProjectRegistry for ChainClient {
    async fn project_owner(&self, project_id: U256) -> Result<Address, ChainError> {
        match self.contract.getProject(project_id).call().await {
            Ok(project) => Ok(project.owner),
            // Unknown ids revert on some deployments and return an empty
            // record on others; both mean "no such project".
            Err(e) if e.as_revert_data().is_some() => Ok(Address::ZERO),
            Err(e) => Err(ChainError::Contract(e.to_string())),
        }
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.contract
            .provider()
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(url: &str) -> ChainSettings {
        ChainSettings {
            rpc_url: url.parse().unwrap(),
            contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap(),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn builds_for_http_endpoints() {
        let client = ChainClient::new(settings("https://rpc.example.org")).unwrap();
        assert_eq!(client.settings().rpc_url.as_str(), "https://rpc.example.org/");
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(matches!(
            ChainClient::new(settings("ws://rpc.example.org")),
            Err(ChainError::InvalidRpcUrl(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let client = ChainClient::new(settings("http://127.0.0.1:1")).unwrap();
        assert!(client.project_owner(U256::from(1u64)).await.is_err());
        assert!(client.block_number().await.is_err());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::cookies::CookiePolicy;
use crate::auth::csrf::CsrfGuard;
use crate::auth::session::{SessionError, SessionService};
use crate::auth::signature::{ChallengeTemplate, SignatureVerifier};
use crate::blockchain::{ChainError, OwnershipVerifier, ProjectRegistry, RpcProxy, RpcProxyError};
use crate::config::{ConfigError, GatewayConfig};
use crate::ratelimit::RateLimiter;
use crate::storage::{MetadataStore, StorageError};

/// Failures while assembling the service at startup. All are fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("session service: {0}")]
    Session(#[from] SessionError),

    #[error("chain client: {0}")]
    Chain(#[from] ChainError),

    #[error("RPC passthrough: {0}")]
    RpcProxy(#[from] RpcProxyError),

    #[error("metadata store: {0}")]
    Storage(#[from] StorageError),

    #[error("TLS: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a request handler needs. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub sessions: SessionService,
    pub csrf: CsrfGuard,
    pub cookies: CookiePolicy,
    pub signatures: SignatureVerifier,
    pub rate_limiter: RateLimiter,
    pub ownership: OwnershipVerifier,
    pub store: Arc<dyn MetadataStore>,
    pub rpc_proxy: RpcProxy,
}

impl AppState {
    /// Wire the services together. The chain registry and metadata store
    /// are injected so tests can substitute them.
    pub fn new(
        config: GatewayConfig,
        registry: Arc<dyn ProjectRegistry>,
        store: Arc<dyn MetadataStore>,
    ) -> Result<Self, StartupError> {
        let sessions = SessionService::new(&config.session_secret, config.session_ttl)?;
        let csrf = CsrfGuard::new(config.csrf_secret.clone());
        let cookies = CookiePolicy::new(
            config.environment,
            config.cookie_domain.clone(),
            sessions.ttl(),
        );
        let signatures = SignatureVerifier::new(
            ChallengeTemplate::new(config.app_name.clone(), config.challenge_window),
            config.wallet_allowlist.clone(),
        );
        let rate_limiter = RateLimiter::new(config.rate_limits);
        let ownership = OwnershipVerifier::new(registry, config.chain.timeout);
        let rpc_proxy = RpcProxy::new(config.chain.rpc_url.clone())?;

        Ok(Self {
            config: Arc::new(config),
            sessions,
            csrf,
            cookies,
            signatures,
            rate_limiter,
            ownership,
            store,
            rpc_proxy,
        })
    }
}

#[cfg(test)]
impl AppState {
    /// Test state with an empty registry and in-memory store.
    pub(crate) fn for_tests() -> Self {
        Self::with_registry(
            GatewayConfig::for_tests(),
            Arc::new(crate::blockchain::ownership::test_support::StaticRegistry::default()),
        )
    }

    pub(crate) fn with_registry(config: GatewayConfig, registry: Arc<dyn ProjectRegistry>) -> Self {
        Self::new(
            config,
            registry,
            Arc::new(crate::storage::InMemoryMetadataStore::new()),
        )
        .expect("test state builds")
    }
}

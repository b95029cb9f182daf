// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Optional HTTPS termination.
//!
//! Deployments behind a TLS-terminating proxy leave `TLS_CERT_PATH` and
//! `TLS_KEY_PATH` unset and serve plain HTTP.

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsPaths;
use crate::state::StartupError;

/// Install the ring provider for rustls. Must run before any TLS config is
/// built; repeated calls are harmless.
pub fn install_crypto_provider() {
    // Err means a provider is already installed for this process.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Load the PEM certificate chain and private key.
pub async fn load_rustls_config(paths: &TlsPaths) -> Result<RustlsConfig, StartupError> {
    install_crypto_provider();

    RustlsConfig::from_pem_file(&paths.cert, &paths.key)
        .await
        .map_err(|e| {
            StartupError::Tls(format!(
                "failed to load {} / {}: {e}",
                paths.cert.display(),
                paths.key.display()
            ))
        })
}

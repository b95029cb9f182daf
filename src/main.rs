// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use axum_server::Handle;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relational_crowdfund_gateway::{
    api::router,
    blockchain::ChainClient,
    config::{GatewayConfig, LOG_FORMAT_ENV},
    state::{AppState, StartupError},
    storage::{InMemoryMetadataStore, MetadataStore, RedbMetadataStore},
    tls::load_rustls_config,
};

/// In-flight requests get this long to finish after a shutdown signal.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run().await {
        Ok(()) => {
            info!("Server shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Gateway failed to start");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var(LOG_FORMAT_ENV).as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

async fn run() -> Result<(), StartupError> {
    let config = GatewayConfig::from_env()?;
    info!(environment = ?config.environment, contract = %config.chain.contract_address, "Configuration loaded");

    let store: Arc<dyn MetadataStore> = match &config.data_dir {
        Some(dir) => {
            info!(data_dir = %dir.display(), "Using redb metadata store");
            Arc::new(RedbMetadataStore::open(dir)?)
        }
        None => {
            warn!("DATA_DIR not set; metadata is kept in memory and lost on restart");
            Arc::new(InMemoryMetadataStore::new())
        }
    };

    let registry = Arc::new(ChainClient::new(config.chain.clone())?);
    let addr = config.bind_addr()?;
    let tls = match &config.tls {
        Some(paths) => Some(load_rustls_config(paths).await?),
        None => None,
    };

    let state = AppState::new(config, registry, store)?;

    let background = CancellationToken::new();
    let cleanup = state.rate_limiter.start_cleanup_task(background.clone());

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let handle = Handle::new();
    let signal_handle = handle.clone();
    let signal_token = background.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!(
            timeout_secs = GRACEFUL_SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown signal received, draining connections"
        );
        signal_token.cancel();
        signal_handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
    });

    let served = match tls {
        Some(tls) => {
            info!(%addr, "Crowdfund gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await
        }
        None => {
            info!(%addr, "Crowdfund gateway listening on http (docs at /docs)");
            axum_server::bind(addr).handle(handle).serve(app).await
        }
    };

    background.cancel();
    let _ = cleanup.await;
    served.map_err(StartupError::Io)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

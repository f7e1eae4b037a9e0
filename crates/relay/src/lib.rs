// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event relay: fan pub/sub messages out to authorized WebSocket clients.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod registry;
pub mod state;
pub mod test_support;
pub mod transport;
pub mod upstream;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::AuthGate;
use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::transport::build_router;
use crate::upstream::Subscription;

/// Install the ring crypto provider for rustls. Safe to call more than once.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Initialize the global tracing subscriber from the config.
pub fn init_tracing(config: &RelayConfig) {
    use tracing_subscriber::fmt;

    let level = if config.debug { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" if !config.debug => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the relay until shutdown or upstream loss.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    config.validate()?;

    let subscription = upstream::connect(&config)
        .await
        .with_context(|| format!("subscribing to {}", config.redacted_upstream_url()))?;

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    serve(config, subscription, shutdown).await
}

/// Serve clients from an established subscription until `shutdown` fires.
///
/// Returns an error if the subscription ends first.
pub async fn serve(
    config: RelayConfig,
    subscription: Subscription,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let gate = AuthGate::from_config(&config)?;
    info!(
        upstream = %config.redacted_upstream_url(),
        pattern = %config.pattern,
        delivery = %config.delivery_mode(),
        auth = %config.auth_mode,
        ws_route = %config.ws_route(),
        queue_capacity = config.client_queue_capacity,
        "starting event relay"
    );

    let state = Arc::new(RelayState::new(config, gate, shutdown.clone()));
    let listener = RelayListener::bind(&state.config).await?;
    let driver =
        upstream::spawn_driver(subscription, state.dispatcher.clone(), shutdown.clone());

    let served = listener.serve(build_router(Arc::clone(&state)), shutdown.clone()).await;
    shutdown.cancel();
    served?;
    driver.await??;

    info!("event relay stopped");
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
                shutdown.cancel();
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
                shutdown.cancel();
            }
        }
    });
}

enum RelayListener {
    Tcp(TcpListener),
    Unix(UnixListener, PathBuf),
}

impl RelayListener {
    async fn bind(config: &RelayConfig) -> anyhow::Result<Self> {
        if let Some(ref path) = config.socket {
            // Remove a stale socket left by a previous run.
            let _ = std::fs::remove_file(path);
            let listener = UnixListener::bind(path)
                .with_context(|| format!("binding unix socket {}", path.display()))?;
            info!(socket = %path.display(), "event relay listening");
            return Ok(Self::Unix(listener, path.clone()));
        }

        let addr = format!("{}:{}", config.host, config.port);
        let listener =
            TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
        info!(addr = %listener.local_addr()?, "event relay listening");
        Ok(Self::Tcp(listener))
    }

    async fn serve(self, router: Router, shutdown: CancellationToken) -> anyhow::Result<()> {
        match self {
            Self::Tcp(listener) => {
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown.cancelled_owned())
                    .await?;
            }
            Self::Unix(listener, path) => {
                let result = axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown.cancelled_owned())
                    .await;
                let _ = std::fs::remove_file(&path);
                result?;
            }
        }
        Ok(())
    }
}

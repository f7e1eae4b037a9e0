// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for unit and integration tests.

#![doc(hidden)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthGate;
use crate::config::RelayConfig;
use crate::state::RelayState;

/// Build relay state from `config` with a fresh shutdown token.
pub fn relay_state(config: RelayConfig) -> anyhow::Result<Arc<RelayState>> {
    let gate = AuthGate::from_config(&config)?;
    Ok(Arc::new(RelayState::new(config, gate, CancellationToken::new())))
}

/// Serve `router` on a random local port.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_router(
    router: Router,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}

/// Serve the relay's router on a random local port.
pub async fn spawn_http_server(
    state: Arc<RelayState>,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    spawn_router(crate::transport::build_router(state)).await
}

/// A local address nothing is listening on.
pub async fn unreachable_addr() -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

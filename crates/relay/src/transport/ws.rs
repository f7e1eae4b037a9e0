// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket handler for push clients.
//!
//! The credential is checked once, before the upgrade. Denied handshakes get
//! a 403 and never reach the registry. Accepted connections register a
//! bounded frame queue and a writer loop drains it until the client leaves or
//! the relay shuts down.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::error::Forbidden;
use crate::registry::ClientHandle;
use crate::state::RelayState;
use crate::transport::auth;

/// Query parameters for the WS upgrade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayWsQuery {
    pub token: Option<String>,
}

/// `GET {base_path}{ws_path}`: WebSocket upgrade for a push client.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<RelayWsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = auth::handshake_credential(&headers, query.token.as_deref());
    if !state.gate.authorize(credential).await {
        return Forbidden.into_response();
    }

    let id = state.registry.next_id();
    ws.on_upgrade(move |socket| handle_ws(socket, state, id)).into_response()
}

/// Per-connection task: register, drain the frame queue, deregister.
async fn handle_ws(socket: WebSocket, state: Arc<RelayState>, id: u64) {
    let (handle, mut frames) = ClientHandle::new(id, state.config.client_queue_capacity);
    let handle = Arc::new(handle);
    if !state.registry.add(Arc::clone(&handle)).await {
        return;
    }
    let clients = state.registry.len().await;
    tracing::info!(conn_id = id, clients, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }

            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                    tracing::debug!(conn_id = id, err = %e, "websocket send failed");
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(conn_id = id, err = %e, "websocket read failed");
                        break;
                    }
                    // Clients have nothing to say; pings are answered by the socket.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.registry.remove(id).await;
    let clients = state.registry.len().await;
    tracing::info!(
        conn_id = id,
        clients,
        connected_ms = handle.connected_at.elapsed().as_millis() as u64,
        "client disconnected"
    );
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;

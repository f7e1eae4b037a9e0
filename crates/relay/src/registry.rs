// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of connected, authorized WebSocket clients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, RwLock};

/// Sending half of a client's outbound event queue.
pub type FrameSender = mpsc::Sender<Utf8Bytes>;

/// Receiving half, drained by the client's writer task.
pub type FrameReceiver = mpsc::Receiver<Utf8Bytes>;

/// A connected client that passed the authorization gate.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: u64,
    pub connected_at: Instant,
    tx: FrameSender,
}

impl ClientHandle {
    /// Create a handle and the queue its writer task drains.
    pub fn new(id: u64, capacity: usize) -> (Self, FrameReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, connected_at: Instant::now(), tx }, rx)
    }

    /// Enqueue a frame without waiting.
    pub fn try_send(&self, frame: Utf8Bytes) -> Result<(), mpsc::error::TrySendError<Utf8Bytes>> {
        self.tx.try_send(frame)
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Connection id → client map with copy-on-read snapshots.
///
/// Ids come from a process-wide counter and are never reused.
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<u64, Arc<ClientHandle>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Allocate a fresh connection id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register an authorized client. Returns `false` if the id is already taken,
    /// in which case the existing member is kept.
    pub async fn add(&self, handle: Arc<ClientHandle>) -> bool {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&handle.id) {
            tracing::error!(conn_id = handle.id, "connection id registered twice");
            return false;
        }
        clients.insert(handle.id, handle);
        true
    }

    /// Remove a client. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: u64) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    /// Point-in-time copy of all members.
    pub async fn snapshot(&self) -> Vec<Arc<ClientHandle>> {
        self.clients.read().await.values().map(Arc::clone).collect()
    }

    #[cfg(test)]
    pub async fn contains(&self, id: u64) -> bool {
        self.clients.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

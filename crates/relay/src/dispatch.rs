// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out of inbound pub/sub messages to every registered client.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use crate::config::DeliveryMode;
use crate::event::{normalize, payload_preview};
use crate::registry::ConnectionRegistry;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Clients the frame was enqueued for.
    pub delivered: usize,
    /// Clients that were closed or too far behind to accept the frame.
    pub failed: usize,
    /// The message was dropped before fan-out (undecodable payload).
    pub dropped: bool,
}

/// Normalizes inbound messages and enqueues them on every client's queue.
///
/// A pass never awaits a client: sends are `try_send` against bounded
/// per-client queues, so a slow client loses events instead of stalling
/// the pass.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    mode: DeliveryMode,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, mode: DeliveryMode) -> Self {
        Self { registry, mode }
    }

    pub async fn dispatch(&self, channel: &str, payload: &[u8]) -> DispatchReport {
        let event = match normalize(channel, payload, self.mode) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    channel,
                    payload = %payload_preview(payload),
                    err = %e,
                    "dropping undecodable message"
                );
                return DispatchReport { dropped: true, ..Default::default() };
            }
        };

        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(channel, err = %e, "failed to encode relay event");
                return DispatchReport { dropped: true, ..Default::default() };
            }
        };

        let clients = self.registry.snapshot().await;
        let mut report = DispatchReport::default();

        for client in &clients {
            match client.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Closed(_)) => {
                    report.failed += 1;
                    tracing::debug!(conn_id = client.id, channel, "client closed before delivery");
                }
                Err(TrySendError::Full(_)) => {
                    report.failed += 1;
                    tracing::warn!(
                        conn_id = client.id,
                        channel,
                        "client queue full, dropping event for this client"
                    );
                }
            }
        }

        tracing::trace!(channel, delivered = report.delivered, failed = report.failed, "dispatched");
        report
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

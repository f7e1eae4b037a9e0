// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::AuthGate;
use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::registry::ConnectionRegistry;

/// Shared relay state, built once at startup.
pub struct RelayState {
    pub config: RelayConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Dispatcher,
    pub gate: AuthGate,
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(config: RelayConfig, gate: AuthGate, shutdown: CancellationToken) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), config.delivery_mode());
        Self { config, registry, dispatcher, gate, shutdown }
    }
}

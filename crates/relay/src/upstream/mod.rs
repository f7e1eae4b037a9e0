// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream pub/sub subscription and the driver that feeds the dispatcher.

pub mod nats_sub;
pub mod redis_sub;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::{RelayConfig, UpstreamKind};
use crate::dispatch::Dispatcher;

/// One message delivered by the upstream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self { channel: channel.into(), payload: payload.into() }
    }
}

/// A live upstream subscription.
///
/// Yields messages in delivery order and ends when the transport is lost.
pub struct Subscription {
    messages: BoxStream<'static, InboundMessage>,
    // Dropping the NATS client would tear down the subscriber.
    _nats: Option<async_nats::Client>,
}

impl Subscription {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = InboundMessage> + Send + 'static,
    {
        Self { messages: stream.boxed(), _nats: None }
    }

    fn with_nats_client(mut self, client: async_nats::Client) -> Self {
        self._nats = Some(client);
        self
    }

    pub async fn next(&mut self) -> Option<InboundMessage> {
        self.messages.next().await
    }
}

/// Connect to the configured upstream and subscribe to the pattern.
pub async fn connect(config: &RelayConfig) -> anyhow::Result<Subscription> {
    match config.upstream_kind()? {
        UpstreamKind::Redis => redis_sub::subscribe(&config.upstream_url, &config.pattern).await,
        UpstreamKind::Nats => {
            nats_sub::subscribe(&config.upstream_url, config.nats_token.as_deref(), &config.pattern)
                .await
        }
    }
}

/// Feed every upstream message to the dispatcher, one at a time, in order.
///
/// Returns `Ok` on shutdown and an error when the subscription ends.
pub async fn drive(
    mut subscription: Subscription,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            msg = subscription.next() => {
                let Some(msg) = msg else {
                    anyhow::bail!("upstream subscription closed");
                };
                dispatcher.dispatch(&msg.channel, &msg.payload).await;
                // Let client writers drain between messages under a burst.
                tokio::task::yield_now().await;
            }
        }
    }
}

/// Spawn the driver as a background task.
///
/// Losing the subscription is fatal: the error is logged and the shutdown
/// token cancelled so the server drains and the process can exit non-zero.
pub fn spawn_driver(
    subscription: Subscription,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let result = drive(subscription, dispatcher, shutdown.clone()).await;
        if let Err(ref e) = result {
            tracing::error!(err = %e, "upstream lost, shutting down");
            shutdown.cancel();
        }
        result
    })
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;

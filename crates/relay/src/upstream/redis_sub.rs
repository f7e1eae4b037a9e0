// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis pattern subscription.

use bytes::Bytes;
use futures_util::StreamExt;

use super::{InboundMessage, Subscription};

/// `PSUBSCRIBE pattern` on a dedicated pub/sub connection.
pub async fn subscribe(url: &str, pattern: &str) -> anyhow::Result<Subscription> {
    let client = redis::Client::open(url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(pattern).await?;
    tracing::info!(pattern, "redis subscription established");

    let messages = pubsub.into_on_message().map(|msg| {
        InboundMessage::new(msg.get_channel_name(), Bytes::copy_from_slice(msg.get_payload_bytes()))
    });
    Ok(Subscription::from_stream(messages))
}

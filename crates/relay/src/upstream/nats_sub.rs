// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS subject subscription.
//!
//! The NATS client reconnects on its own, so the subscription stream only
//! ends when the client gives up or is dropped.

use futures_util::StreamExt;

use super::{InboundMessage, Subscription};

pub async fn subscribe(
    url: &str,
    token: Option<&str>,
    subject: &str,
) -> anyhow::Result<Subscription> {
    let opts = if let Some(token) = token {
        async_nats::ConnectOptions::with_token(token.to_owned())
    } else {
        async_nats::ConnectOptions::new()
    };

    let client = opts.connect(url).await?;
    let sub = client.subscribe(subject.to_owned()).await?;
    tracing::info!(url = %url, subject, "nats subscription established");

    let messages = sub.map(|msg| InboundMessage::new(msg.subject.as_str(), msg.payload));
    Ok(Subscription::from_stream(messages).with_nats_client(client))
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay events: the unit pushed to WebSocket clients.
//!
//! Every inbound pub/sub message is normalized once into a [`RelayEvent`]
//! carrying its origin channel, then encoded once into a text frame shared by
//! all recipients. The channel travels with the payload because clients
//! cannot otherwise tell which of the pattern-matched channels it came from.

use std::fmt;

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;

use crate::config::DeliveryMode;

/// Maximum number of payload characters echoed into log lines.
const PAYLOAD_PREVIEW_CHARS: usize = 256;

/// A normalized `(channel, message)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayEvent {
    pub channel: String,
    pub message: serde_json::Value,
}

impl RelayEvent {
    /// Encode the wire frame `{"channel": ..., "message": ...}`.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

/// Why an inbound payload could not be turned into a [`RelayEvent`].
#[derive(Debug)]
pub enum NormalizeError {
    InvalidJson(serde_json::Error),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(e) => write!(f, "payload is not valid JSON: {e}"),
        }
    }
}

impl std::error::Error for NormalizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidJson(e) => Some(e),
        }
    }
}

/// Build a [`RelayEvent`] from a raw payload.
///
/// Structured mode rejects anything that is not a complete JSON document.
/// Passthrough mode never fails: the payload is forwarded as a string, with
/// invalid UTF-8 replaced.
pub fn normalize(
    channel: &str,
    payload: &[u8],
    mode: DeliveryMode,
) -> Result<RelayEvent, NormalizeError> {
    let message = match mode {
        DeliveryMode::Structured => {
            serde_json::from_slice(payload).map_err(NormalizeError::InvalidJson)?
        }
        DeliveryMode::Passthrough => {
            serde_json::Value::String(String::from_utf8_lossy(payload).into_owned())
        }
    };
    Ok(RelayEvent { channel: channel.to_owned(), message })
}

/// Truncated, lossy rendering of a payload for log context.
pub fn payload_preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    match text.char_indices().nth(PAYLOAD_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

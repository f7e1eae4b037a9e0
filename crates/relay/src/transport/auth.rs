// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::HeaderMap;

/// Extract a Bearer token from HTTP headers.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get("authorization").and_then(|v| v.to_str().ok())?;
    let token = header.strip_prefix("Bearer ").or_else(|| header.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// The credential presented at handshake.
///
/// Browsers cannot set headers on WebSocket upgrades, so the `token` query
/// parameter is checked first; the `Authorization` header covers
/// non-browser clients.
pub fn handshake_credential<'a>(
    headers: &'a HeaderMap,
    query_token: Option<&'a str>,
) -> Option<&'a str> {
    query_token.filter(|t| !t.is_empty()).or_else(|| bearer_from_headers(headers))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

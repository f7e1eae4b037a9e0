// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delegated authorization against a remote policy-decision endpoint.

use serde::Serialize;

use crate::auth::{body_snippet, AuthFailure};

/// Single-permission evaluation request.
#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    resource: &'a serde_json::Value,
    permission: &'a str,
}

/// Client for `POST {base}/policy/evaluate_one`.
pub struct PolicyClient {
    http: reqwest::Client,
    evaluate_url: String,
    resource: serde_json::Value,
    permission: String,
}

impl PolicyClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        resource: serde_json::Value,
        permission: String,
    ) -> Self {
        let evaluate_url = format!("{}/policy/evaluate_one", base_url.trim_end_matches('/'));
        Self { http, evaluate_url, resource, permission }
    }

    /// Ask the authority whether `token` holds the configured permission.
    /// One request, no retry.
    pub async fn evaluate(&self, token: &str) -> Result<(), AuthFailure> {
        let body = EvaluateRequest { resource: &self.resource, permission: &self.permission };
        let resp = self
            .http
            .post(&self.evaluate_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthFailure::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthFailure::Status { status: status.as_u16(), body: body_snippet(&text) });
        }

        let bytes = resp.bytes().await.map_err(|e| AuthFailure::Transport(e.to_string()))?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AuthFailure::Malformed(e.to_string()))?;

        match parse_decision(&value) {
            Some(true) => Ok(()),
            Some(false) => Err(AuthFailure::Denied),
            None => Err(AuthFailure::Malformed(format!(
                "expected boolean result, got {}",
                body_snippet(&value.to_string())
            ))),
        }
    }
}

/// Accept a bare boolean or `{"result": <bool>}`.
fn parse_decision(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Object(map) => map.get("result").and_then(serde_json::Value::as_bool),
        _ => None,
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

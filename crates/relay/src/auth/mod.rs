// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection authorization gate.
//!
//! [`AuthGate::authorize`] is a total function from an optional bearer
//! credential to allow/deny. Every failure mode (missing credential,
//! unreachable authority, timeout, error status, unparsable response,
//! invalid token) resolves to a denial. The reason is only logged, never
//! surfaced to the client.

pub mod oidc;
pub mod policy;

use std::fmt;

use crate::auth::oidc::OidcVerifier;
use crate::auth::policy::PolicyClient;
use crate::config::{AuthMode, RelayConfig};

/// Why a credential was not accepted. Internal to the gate; used for logging.
#[derive(Debug)]
pub enum AuthFailure {
    /// The authority could not be reached (connect error, timeout, body read).
    Transport(String),
    /// The authority answered with a non-success status.
    Status { status: u16, body: String },
    /// The authority's response could not be interpreted.
    Malformed(String),
    /// The credential itself was rejected (bad signature, expired, wrong issuer).
    InvalidToken(String),
    /// The authority evaluated the request and said no.
    Denied,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "authority unreachable: {e}"),
            Self::Status { status, body } => write!(f, "authority returned {status}: {body}"),
            Self::Malformed(e) => write!(f, "malformed authority response: {e}"),
            Self::InvalidToken(e) => write!(f, "invalid token: {e}"),
            Self::Denied => f.write_str("denied by policy"),
        }
    }
}

impl std::error::Error for AuthFailure {}

/// The authorization strategy selected at startup.
pub enum AuthGate {
    Disabled,
    Policy(PolicyClient),
    Oidc(OidcVerifier),
}

impl AuthGate {
    pub fn from_config(config: &RelayConfig) -> anyhow::Result<Self> {
        match config.auth_mode {
            AuthMode::Disabled => Ok(Self::Disabled),
            AuthMode::Policy => {
                let base = config
                    .authz_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("--auth-mode policy requires --authz-url"))?;
                Ok(Self::Policy(PolicyClient::new(
                    http_client(config)?,
                    base,
                    config.authz_resource_json()?,
                    config.authz_permission.clone(),
                )))
            }
            AuthMode::Oidc => {
                let url = config.openid_config_url.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("--auth-mode oidc requires --openid-config-url")
                })?;
                Ok(Self::Oidc(OidcVerifier::new(
                    http_client(config)?,
                    url,
                    config.openid_audience.clone(),
                    config.openid_cache_ttl(),
                )))
            }
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Self::Disabled => AuthMode::Disabled,
            Self::Policy(_) => AuthMode::Policy,
            Self::Oidc(_) => AuthMode::Oidc,
        }
    }

    /// Decide whether a connection presenting `credential` may receive events.
    pub async fn authorize(&self, credential: Option<&str>) -> bool {
        if let Self::Disabled = self {
            return true;
        }

        let Some(credential) = credential.map(str::trim).filter(|c| !c.is_empty()) else {
            tracing::info!(mode = %self.mode(), "connection denied: no credential");
            return false;
        };

        let result = match self {
            Self::Disabled => Ok(()),
            Self::Policy(client) => client.evaluate(credential).await,
            Self::Oidc(verifier) => verifier.verify(credential).await.map(|_| ()),
        };

        let mode = self.mode();
        match result {
            Ok(()) => return true,
            Err(AuthFailure::Transport(ref e)) => {
                tracing::warn!(%mode, err = %e, "connection denied: authority unreachable");
            }
            Err(AuthFailure::Status { status, ref body }) => {
                tracing::warn!(
                    %mode,
                    status,
                    body = %body,
                    "connection denied: authority error status"
                );
            }
            Err(AuthFailure::Malformed(ref e)) => {
                tracing::warn!(%mode, err = %e, "connection denied: malformed authority response");
            }
            Err(ref failure) => {
                tracing::info!(%mode, reason = %failure, "connection denied");
            }
        }
        false
    }
}

/// HTTP client shared by the authorization strategies, bounded by the auth timeout.
fn http_client(config: &RelayConfig) -> anyhow::Result<reqwest::Client> {
    crate::install_crypto_provider();
    Ok(reqwest::Client::builder().timeout(config.auth_timeout()).build()?)
}

/// Truncate an authority response body for logging.
fn body_snippet(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_owned(),
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

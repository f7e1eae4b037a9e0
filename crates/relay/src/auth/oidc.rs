// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local bearer-token verification against an OpenID Connect provider.
//!
//! The discovery document (issuer + `jwks_uri`) and the key set it points
//! to are fetched together and cached for a fixed TTL. An expired or
//! missing entry triggers one refresh, serialized across concurrent
//! connects; if the refresh fails the token is rejected rather than checked
//! against stale keys.
//!
//! A token whose `kid` is absent from a fresh key set forces one early
//! refresh so rotated keys are picked up before the TTL runs out. Forced
//! refreshes are rate limited, so a stream of unknown kids costs at most
//! one fetch per cooldown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::auth::{body_snippet, AuthFailure};

/// Clock skew tolerated on `exp`/`nbf`, in seconds.
const LEEWAY_SECS: u64 = 60;

/// Minimum spacing between refreshes forced by an unknown `kid`.
const KID_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// The subset of the OpenID discovery document the relay needs.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
}

/// Claims read from a verified token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    pub iss: String,
    pub exp: u64,
}

struct CachedProvider {
    issuer: String,
    jwks: JwkSet,
    fetched_at: Instant,
}

pub struct OidcVerifier {
    http: reqwest::Client,
    config_url: String,
    audience: Option<String>,
    ttl: Duration,
    cache: RwLock<Option<Arc<CachedProvider>>>,
    /// Serializes fetches. Holds the time of the last forced refresh.
    refresh: Mutex<Option<Instant>>,
}

impl OidcVerifier {
    pub fn new(
        http: reqwest::Client,
        config_url: &str,
        audience: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            http,
            config_url: config_url.to_owned(),
            audience,
            ttl,
            cache: RwLock::new(None),
            refresh: Mutex::new(None),
        }
    }

    /// Verify signature, issuer, audience and validity window of `token`.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthFailure> {
        let header =
            decode_header(token).map_err(|e| AuthFailure::InvalidToken(e.to_string()))?;
        if matches!(header.alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthFailure::InvalidToken(format!(
                "symmetric algorithm {:?} not accepted",
                header.alg
            )));
        }

        let mut provider = self.provider().await?;
        if select_key(&provider.jwks, header.kid.as_deref(), header.alg).is_none() {
            provider = self.refresh_for_unknown_key(&provider).await?;
        }

        let jwk = select_key(&provider.jwks, header.kid.as_deref(), header.alg).ok_or_else(|| {
            AuthFailure::InvalidToken(format!(
                "no signing key for kid={:?} alg={:?}",
                header.kid, header.alg
            ))
        })?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthFailure::InvalidToken(format!("unusable signing key: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = LEEWAY_SECS;
        validation.validate_nbf = true;
        validation.set_issuer(&[provider.issuer.as_str()]);
        match self.audience {
            Some(ref aud) => validation.set_audience(&[aud.as_str()]),
            None => validation.validate_aud = false,
        }

        let data = decode::<TokenClaims>(token, &key, &validation)
            .map_err(|e| AuthFailure::InvalidToken(e.to_string()))?;

        tracing::debug!(sub = ?data.claims.sub, iss = %data.claims.iss, "token verified");
        Ok(data.claims)
    }

    /// Cached issuer, if a fresh entry exists.
    #[cfg(test)]
    pub async fn cached_issuer(&self) -> Option<String> {
        let cache = self.cache.read().await;
        cache.as_ref().filter(|p| p.fetched_at.elapsed() < self.ttl).map(|p| p.issuer.clone())
    }

    async fn provider(&self) -> Result<Arc<CachedProvider>, AuthFailure> {
        if let Some(provider) = self.fresh_entry().await {
            return Ok(provider);
        }

        let _guard = self.refresh.lock().await;

        // Another connect may have refreshed while we waited.
        if let Some(provider) = self.fresh_entry().await {
            return Ok(provider);
        }

        self.fetch_provider().await
    }

    /// Refetch after a key lookup against `seen` came up empty.
    ///
    /// Returns `seen` unchanged while the cooldown from the previous forced
    /// refresh is still running.
    async fn refresh_for_unknown_key(
        &self,
        seen: &Arc<CachedProvider>,
    ) -> Result<Arc<CachedProvider>, AuthFailure> {
        let mut last_forced = self.refresh.lock().await;

        if let Some(current) = self.fresh_entry().await {
            if !Arc::ptr_eq(&current, seen) {
                return Ok(current);
            }
        }
        if last_forced.is_some_and(|at| at.elapsed() < KID_REFRESH_COOLDOWN) {
            return Ok(Arc::clone(seen));
        }

        *last_forced = Some(Instant::now());
        tracing::debug!("unknown signing key, refreshing OpenID configuration");
        self.fetch_provider().await
    }

    /// Fetch discovery and key set and replace the cache entry. Callers hold
    /// the refresh lock.
    async fn fetch_provider(&self) -> Result<Arc<CachedProvider>, AuthFailure> {
        let discovery: DiscoveryDocument = self.fetch_json(&self.config_url).await?;
        let jwks: JwkSet = self.fetch_json(&discovery.jwks_uri).await?;
        tracing::info!(
            issuer = %discovery.issuer,
            keys = jwks.keys.len(),
            "refreshed OpenID configuration"
        );

        let provider =
            Arc::new(CachedProvider { issuer: discovery.issuer, jwks, fetched_at: Instant::now() });
        *self.cache.write().await = Some(Arc::clone(&provider));
        Ok(provider)
    }

    async fn fresh_entry(&self) -> Option<Arc<CachedProvider>> {
        let cache = self.cache.read().await;
        cache.as_ref().filter(|p| p.fetched_at.elapsed() < self.ttl).map(Arc::clone)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AuthFailure> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AuthFailure::Transport(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthFailure::Status { status: status.as_u16(), body: body_snippet(&text) });
        }

        let bytes = resp.bytes().await.map_err(|e| AuthFailure::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| AuthFailure::Malformed(format!("{url}: {e}")))
    }
}

/// Pick the JWK matching `kid`, or the first key compatible with `alg` when
/// the token carries no `kid`.
fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>, alg: Algorithm) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks.keys.iter().find(|k| k.common.key_id.as_deref() == Some(kid)),
        None => jwks
            .keys
            .iter()
            .find(|k| k.common.key_algorithm.map_or(true, |a| algorithm_matches(a, alg))),
    }
}

fn algorithm_matches(jwk_alg: KeyAlgorithm, jwt_alg: Algorithm) -> bool {
    matches!(
        (jwk_alg, jwt_alg),
        (KeyAlgorithm::RS256, Algorithm::RS256)
            | (KeyAlgorithm::RS384, Algorithm::RS384)
            | (KeyAlgorithm::RS512, Algorithm::RS512)
            | (KeyAlgorithm::PS256, Algorithm::PS256)
            | (KeyAlgorithm::PS384, Algorithm::PS384)
            | (KeyAlgorithm::PS512, Algorithm::PS512)
            | (KeyAlgorithm::ES256, Algorithm::ES256)
            | (KeyAlgorithm::ES384, Algorithm::ES384)
            | (KeyAlgorithm::EdDSA, Algorithm::EdDSA)
    )
}

#[cfg(test)]
#[path = "oidc_tests.rs"]
mod tests;

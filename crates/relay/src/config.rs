// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// How inbound payloads are handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Payloads are decoded as JSON; undecodable payloads are dropped.
    Structured,
    /// Payloads are forwarded verbatim as a string.
    Passthrough,
}

impl DeliveryMode {
    pub fn from_json_flag(json_messages: bool) -> Self {
        if json_messages {
            Self::Structured
        } else {
            Self::Passthrough
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structured => f.write_str("structured"),
            Self::Passthrough => f.write_str("passthrough"),
        }
    }
}

/// Which authorization strategy gates WebSocket connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// Every connection is admitted.
    Disabled,
    /// Delegate to a remote policy-decision endpoint.
    Policy,
    /// Verify bearer JWTs locally against keys from an OpenID discovery document.
    Oidc,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Policy => f.write_str("policy"),
            Self::Oidc => f.write_str("oidc"),
        }
    }
}

/// Upstream pub/sub backend, derived from the upstream URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Redis,
    Nats,
}

/// Relay pub/sub channels to WebSocket clients.
#[derive(Debug, Clone, Parser)]
#[command(name = "event-relay", version, about)]
pub struct RelayConfig {
    /// Pub/sub connection string (`redis://`, `redis+unix://`, `unix://` or `nats://`).
    #[arg(long, default_value = "redis://localhost:6379", env = "EVENT_RELAY_UPSTREAM_URL")]
    pub upstream_url: String,

    /// Channel pattern to subscribe to (glob for Redis, subject wildcard for NATS).
    #[arg(long, default_value = "bento.*", env = "EVENT_RELAY_PATTERN")]
    pub pattern: String,

    /// Auth token for NATS upstreams.
    #[arg(long, env = "EVENT_RELAY_NATS_TOKEN")]
    pub nats_token: Option<String>,

    /// Decode payloads as JSON before relaying. When false, payloads are relayed as strings.
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "EVENT_RELAY_JSON_MESSAGES"
    )]
    pub json_messages: bool,

    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "EVENT_RELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "EVENT_RELAY_PORT")]
    pub port: u16,

    /// Unix socket path. Takes precedence over host/port.
    #[arg(long, env = "EVENT_RELAY_SOCKET")]
    pub socket: Option<PathBuf>,

    /// URL prefix for all routes (e.g. `/api/event-relay`).
    #[arg(long, default_value = "", env = "EVENT_RELAY_BASE_PATH")]
    pub base_path: String,

    /// WebSocket route, relative to the base path.
    #[arg(long, default_value = "/ws", env = "EVENT_RELAY_WS_PATH")]
    pub ws_path: String,

    /// Semicolon-separated allowed CORS origins. Permissive when unset.
    #[arg(long, env = "EVENT_RELAY_CORS_ORIGINS")]
    pub cors_origins: Option<String>,

    /// Authorization strategy for WebSocket connections. Required; `disabled`
    /// must be chosen explicitly.
    #[arg(long, value_enum, env = "EVENT_RELAY_AUTH_MODE")]
    pub auth_mode: AuthMode,

    /// Base URL of the policy-decision service (`policy` mode).
    #[arg(long, env = "EVENT_RELAY_AUTHZ_URL")]
    pub authz_url: Option<String>,

    /// JSON resource sent with policy evaluation requests.
    #[arg(long, default_value = r#"{"everything":true}"#, env = "EVENT_RELAY_AUTHZ_RESOURCE")]
    pub authz_resource: String,

    /// Permission required to receive events.
    #[arg(long, default_value = "view:private_portal", env = "EVENT_RELAY_AUTHZ_PERMISSION")]
    pub authz_permission: String,

    /// OpenID discovery document URL (`oidc` mode).
    #[arg(long, env = "EVENT_RELAY_OPENID_CONFIG_URL")]
    pub openid_config_url: Option<String>,

    /// Expected token audience (`oidc` mode). Audience is not checked when unset.
    #[arg(long, env = "EVENT_RELAY_OPENID_AUDIENCE")]
    pub openid_audience: Option<String>,

    /// How long a fetched discovery document and key set stay valid.
    #[arg(long, default_value_t = 3600, env = "EVENT_RELAY_OPENID_CACHE_TTL_SECS")]
    pub openid_cache_ttl_secs: u64,

    /// Timeout for authorization and discovery requests in milliseconds.
    #[arg(long, default_value_t = 5000, env = "EVENT_RELAY_AUTH_TIMEOUT_MS")]
    pub auth_timeout_ms: u64,

    /// Outbound events buffered per client before events are dropped for it.
    #[arg(long, default_value_t = 256, env = "EVENT_RELAY_CLIENT_QUEUE_CAPACITY")]
    pub client_queue_capacity: usize,

    /// Override the `id` reported by `/service-info`.
    #[arg(long, env = "EVENT_RELAY_SERVICE_ID")]
    pub service_id: Option<String>,

    /// Verbose mode: debug-level text logs, `dev` environment in service info.
    #[arg(
        long,
        env = "EVENT_RELAY_DEBUG",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Log format (json or text).
    #[arg(long, default_value = "json", env = "EVENT_RELAY_LOG_FORMAT")]
    pub log_format: String,

    /// Log level filter (trace, debug, info, warn, error, or an EnvFilter directive).
    #[arg(long, default_value = "info", env = "EVENT_RELAY_LOG_LEVEL")]
    pub log_level: String,
}

impl RelayConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pattern.trim().is_empty() {
            anyhow::bail!("--pattern must not be empty");
        }
        if self.client_queue_capacity == 0 {
            anyhow::bail!("--client-queue-capacity must be at least 1");
        }
        self.upstream_kind()?;
        if self.ws_route() == self.service_info_route() {
            anyhow::bail!("--ws-path collides with the service-info route");
        }

        match self.auth_mode {
            AuthMode::Disabled => {}
            AuthMode::Policy => {
                if self.authz_url.as_deref().map_or(true, str::is_empty) {
                    anyhow::bail!("--auth-mode policy requires --authz-url");
                }
                self.authz_resource_json()?;
            }
            AuthMode::Oidc => {
                if self.openid_config_url.as_deref().map_or(true, str::is_empty) {
                    anyhow::bail!("--auth-mode oidc requires --openid-config-url");
                }
            }
        }

        Ok(())
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::from_json_flag(self.json_messages)
    }

    pub fn upstream_kind(&self) -> anyhow::Result<UpstreamKind> {
        let scheme = self.upstream_url.split_once("://").map(|(s, _)| s).unwrap_or_default();
        match scheme {
            "redis" | "redis+unix" | "unix" => Ok(UpstreamKind::Redis),
            "nats" | "tls" => Ok(UpstreamKind::Nats),
            other => anyhow::bail!("unsupported upstream scheme: {other:?}"),
        }
    }

    /// Upstream URL with any password masked, for logging.
    pub fn redacted_upstream_url(&self) -> String {
        let Some((scheme, rest)) = self.upstream_url.split_once("://") else {
            return self.upstream_url.clone();
        };
        match rest.split_once('@') {
            Some((userinfo, host)) if !userinfo.contains('/') => match userinfo.split_once(':') {
                Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
                None => self.upstream_url.clone(),
            },
            _ => self.upstream_url.clone(),
        }
    }

    pub fn authz_resource_json(&self) -> anyhow::Result<serde_json::Value> {
        serde_json::from_str(&self.authz_resource)
            .map_err(|e| anyhow::anyhow!("--authz-resource is not valid JSON: {e}"))
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn openid_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.openid_cache_ttl_secs)
    }

    /// Allowed CORS origins, or `None` for a permissive policy.
    pub fn cors_origin_list(&self) -> Option<Vec<String>> {
        let raw = self.cors_origins.as_deref()?;
        let origins: Vec<String> =
            raw.split(';').map(str::trim).filter(|o| !o.is_empty()).map(str::to_owned).collect();
        if origins.is_empty() {
            None
        } else {
            Some(origins)
        }
    }

    /// Full WebSocket route including the base path.
    pub fn ws_route(&self) -> String {
        join_path(&self.base_path, &self.ws_path)
    }

    /// Full service-info route including the base path.
    pub fn service_info_route(&self) -> String {
        join_path(&self.base_path, "/service-info")
    }

    /// Build a minimal `RelayConfig` for tests.
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            upstream_url: "redis://127.0.0.1:6379".into(),
            pattern: "bento.*".into(),
            nats_token: None,
            json_messages: true,
            host: "127.0.0.1".into(),
            port: 0,
            socket: None,
            base_path: String::new(),
            ws_path: "/ws".into(),
            cors_origins: None,
            auth_mode: AuthMode::Disabled,
            authz_url: None,
            authz_resource: r#"{"everything":true}"#.into(),
            authz_permission: "view:private_portal".into(),
            openid_config_url: None,
            openid_audience: None,
            openid_cache_ttl_secs: 3600,
            auth_timeout_ms: 1000,
            client_queue_capacity: 16,
            service_id: None,
            debug: false,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}

fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_matches('/');
    let path = path.trim_start_matches('/');
    if base.is_empty() {
        format!("/{path}")
    } else {
        format!("/{base}/{path}")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain HTTP handlers: service identity and the 404 fallback.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::config::RelayConfig;
use crate::state::RelayState;

pub const SERVICE_GROUP: &str = "ca.c3g.bento";
pub const SERVICE_ARTIFACT: &str = "event-relay";

// -- Response types -----------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: &'static str,
    pub artifact: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BentoInfo {
    pub service_kind: &'static str,
    pub git_repository: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub id: String,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub description: &'static str,
    pub organization: Organization,
    pub contact_url: &'static str,
    pub version: &'static str,
    pub environment: &'static str,
    pub bento: BentoInfo,
}

impl ServiceInfo {
    pub fn from_config(config: &RelayConfig) -> Self {
        let version = env!("CARGO_PKG_VERSION");
        Self {
            id: config
                .service_id
                .clone()
                .unwrap_or_else(|| format!("{SERVICE_GROUP}:{SERVICE_ARTIFACT}")),
            name: "Bento Event Relay",
            service_type: ServiceType {
                group: SERVICE_GROUP,
                artifact: SERVICE_ARTIFACT,
                version,
            },
            description: "Event relay from Redis PubSub events to WebSocket clients.",
            organization: Organization {
                name: "C3G",
                url: "https://www.computationalgenomics.ca/",
            },
            contact_url: "mailto:info@c3g.ca",
            version,
            environment: if config.debug { "dev" } else { "prod" },
            bento: BentoInfo {
                service_kind: SERVICE_ARTIFACT,
                git_repository: "https://github.com/bento-platform/bento_event_relay",
            },
        }
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET {base_path}/service-info`
pub async fn service_info(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(ServiceInfo::from_config(&state.config))
}

/// Fallback for unknown paths: 404 with an empty body.
pub async fn not_found(uri: Uri) -> StatusCode {
    tracing::debug!(path = %uri.path(), "no route");
    StatusCode::NOT_FOUND
}

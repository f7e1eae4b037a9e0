// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Refusal returned in place of a WebSocket upgrade.
///
/// Every denial gets the same body; the reason only goes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forbidden;

impl Forbidden {
    pub const CODE: &'static str = "FORBIDDEN";

    pub fn body(self) -> ErrorResponse {
        ErrorResponse { error: ErrorBody { code: Self::CODE, message: "forbidden" } }
    }
}

impl IntoResponse for Forbidden {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, Json(self.body())).into_response()
    }
}

/// `{"error": {"code", "message"}}` envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: &'static str,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::Mutex;

use super::{parse_decision, PolicyClient};
use crate::auth::AuthFailure;
use crate::test_support::{spawn_router, unreachable_addr};

/// Requests seen by the fake authority: (authorization header, body).
type Seen = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

async fn fake_authority(
    status: StatusCode,
    body: &'static str,
) -> anyhow::Result<(String, Seen)> {
    let seen: Seen = Arc::default();
    let recorder = Arc::clone(&seen);
    let router = Router::new().route(
        "/policy/evaluate_one",
        post(move |headers: HeaderMap, Json(req): Json<serde_json::Value>| {
            let recorder = Arc::clone(&recorder);
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                recorder.lock().await.push((auth, req));
                (status, body).into_response()
            }
        }),
    );
    let (addr, _handle) = spawn_router(router).await?;
    Ok((format!("http://{addr}"), seen))
}

fn policy_client(base: &str, timeout: Duration) -> anyhow::Result<PolicyClient> {
    crate::install_crypto_provider();
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(PolicyClient::new(http, base, json!({"everything": true}), "view:private_portal".into()))
}

#[test]
fn decision_parsing() {
    assert_eq!(parse_decision(&json!(true)), Some(true));
    assert_eq!(parse_decision(&json!(false)), Some(false));
    assert_eq!(parse_decision(&json!({"result": true})), Some(true));
    assert_eq!(parse_decision(&json!({"result": false})), Some(false));
    assert_eq!(parse_decision(&json!({"result": "yes"})), None);
    assert_eq!(parse_decision(&json!({})), None);
    assert_eq!(parse_decision(&json!([true])), None);
}

#[tokio::test]
async fn allowed_result_sends_bearer_and_permission() -> anyhow::Result<()> {
    let (base, seen) = fake_authority(StatusCode::OK, r#"{"result": true}"#).await?;
    let client = policy_client(&base, Duration::from_secs(2))?;

    client.evaluate("tok-123").await.map_err(|e| anyhow::anyhow!("{e}"))?;

    let seen = seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "Bearer tok-123");
    assert_eq!(
        seen[0].1,
        json!({"resource": {"everything": true}, "permission": "view:private_portal"})
    );
    Ok(())
}

#[tokio::test]
async fn bare_boolean_body_is_accepted() -> anyhow::Result<()> {
    let (base, _) = fake_authority(StatusCode::OK, "true").await?;
    let client = policy_client(&format!("{base}/"), Duration::from_secs(2))?;
    assert!(client.evaluate("tok").await.is_ok());
    Ok(())
}

#[tokio::test]
async fn false_result_is_denied() -> anyhow::Result<()> {
    let (base, _) = fake_authority(StatusCode::OK, r#"{"result": false}"#).await?;
    let client = policy_client(&base, Duration::from_secs(2))?;
    assert!(matches!(client.evaluate("tok").await, Err(AuthFailure::Denied)));
    Ok(())
}

#[tokio::test]
async fn error_status_is_reported_as_status() -> anyhow::Result<()> {
    let (base, _) = fake_authority(StatusCode::INTERNAL_SERVER_ERROR, "boom").await?;
    let client = policy_client(&base, Duration::from_secs(2))?;
    match client.evaluate("tok").await {
        Err(AuthFailure::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => anyhow::bail!("expected Status, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unparsable_body_is_malformed() -> anyhow::Result<()> {
    let (base, _) = fake_authority(StatusCode::OK, "<html>nope</html>").await?;
    let client = policy_client(&base, Duration::from_secs(2))?;
    assert!(matches!(client.evaluate("tok").await, Err(AuthFailure::Malformed(_))));

    let (base, _) = fake_authority(StatusCode::OK, r#"{"allowed": true}"#).await?;
    let client = policy_client(&base, Duration::from_secs(2))?;
    assert!(matches!(client.evaluate("tok").await, Err(AuthFailure::Malformed(_))));
    Ok(())
}

#[tokio::test]
async fn unreachable_authority_is_transport_failure() -> anyhow::Result<()> {
    let addr = unreachable_addr().await?;
    let client = policy_client(&format!("http://{addr}"), Duration::from_secs(2))?;
    let result = client.evaluate("tok").await;
    assert!(matches!(result, Err(AuthFailure::Transport(_))), "got {result:?}");
    Ok(())
}

#[tokio::test]
async fn slow_authority_times_out() -> anyhow::Result<()> {
    let router = Router::new().route(
        "/policy/evaluate_one",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "true"
        }),
    );
    let (addr, _handle) = spawn_router(router).await?;
    let client = policy_client(&format!("http://{addr}"), Duration::from_millis(100))?;

    let result = client.evaluate("tok").await;
    assert!(matches!(result, Err(AuthFailure::Transport(_))), "got {result:?}");
    Ok(())
}

//! Signed webhook deliveries: signature, timestamp window, and nonce claims.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use tokio::task::JoinSet;

use security_perimeter::audit::AuditAction;
use security_perimeter::error::StoreError;
use security_perimeter::webhook::NonceStore;

mod common;
use common::{body_json, test_config, Req, TestApp};

const BODY: &[u8] = br#"{"type":"payment.succeeded","amount":1200}"#;

fn delivery(app: &TestApp, id: &str, timestamp: i64) -> Req {
    let ts = timestamp.to_string();
    Req::post("/api/webhooks/payments")
        .header("webhook-id", id)
        .header("webhook-timestamp", &ts)
        .header("webhook-signature", &app.webhooks.sign(id, &ts, BODY))
        .header("content-type", "application/json")
        .bytes(BODY.to_vec())
}

#[tokio::test]
async fn test_fresh_delivery_is_accepted_once() {
    let app = TestApp::new();
    let now = Utc::now().timestamp();

    let first = app.send(delivery(&app, "evt_1", now).build()).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["received"], true);

    let replay = app.send(delivery(&app, "evt_1", now).build()).await;
    assert_eq!(replay.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(replay).await["error"], "Webhook already processed");

    let entries = app.wait_for_audit(AuditAction::SuspiciousActivity, 1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entity_id.as_deref(), Some("evt_1"));
    assert_eq!(entries[0].metadata["source"], "payments");
    assert_eq!(entries[0].metadata["reason"], "replayed_delivery");

    let other = app.send(delivery(&app, "evt_2", now).build()).await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_timestamps_outside_tolerance_are_rejected() {
    let app = TestApp::new();
    let now = Utc::now().timestamp();

    let stale = app.send(delivery(&app, "evt_old", now - 301).build()).await;
    assert_eq!(stale.status(), StatusCode::BAD_REQUEST);

    let future = app.send(delivery(&app, "evt_future", now + 301).build()).await;
    assert_eq!(future.status(), StatusCode::BAD_REQUEST);

    let edge = app.send(delivery(&app, "evt_edge", now - 250).build()).await;
    assert_eq!(edge.status(), StatusCode::OK);

    let entries = app.wait_for_audit(AuditAction::WebhookRejected, 2).await;
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|e| e.metadata["reason"] == "invalid_timestamp"));

    // A rejected timestamp never claims the id.
    let retried = app.send(delivery(&app, "evt_old", now).build()).await;
    assert_eq!(retried.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bad_signature_is_rejected_before_nonce_claim() {
    let app = TestApp::new();
    let ts = Utc::now().timestamp().to_string();

    let response = app
        .send(
            Req::post("/api/webhooks/payments")
                .header("webhook-id", "evt_forged")
                .header("webhook-timestamp", &ts)
                .header("webhook-signature", &app.webhooks.sign("evt_forged", &ts, b"other body"))
                .bytes(BODY.to_vec())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid webhook signature");

    let entries = app.wait_for_audit(AuditAction::WebhookRejected, 1).await;
    assert_eq!(entries[0].metadata["reason"], "signature_mismatch");

    // The forged attempt did not burn the id.
    let genuine = app
        .send(delivery(&app, "evt_forged", Utc::now().timestamp()).build())
        .await;
    assert_eq!(genuine.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_id_is_rejected() {
    let app = TestApp::new();
    let ts = Utc::now().timestamp().to_string();

    let response = app
        .send(
            Req::post("/api/webhooks/payments")
                .header("webhook-timestamp", &ts)
                .header("webhook-signature", &app.webhooks.sign("", &ts, BODY))
                .bytes(BODY.to_vec())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing webhook id");
}

#[tokio::test]
async fn test_concurrent_duplicates_accept_exactly_one() {
    let app = TestApp::new();
    let now = Utc::now().timestamp();

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let router = app.router.clone();
        let request = delivery(&app, "evt_race", now).build();
        tasks.spawn(async move {
            use tower::ServiceExt;
            router.oneshot(request).await.unwrap().status()
        });
    }

    let mut accepted = 0;
    let mut replayed = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap() {
            StatusCode::OK => accepted += 1,
            StatusCode::CONFLICT => replayed += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(replayed, 15);
}

struct DownStore;

#[async_trait]
impl NonceStore for DownStore {
    async fn claim(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let app = TestApp::with_nonce_store(test_config(), Arc::new(DownStore));

    let response = app
        .send(delivery(&app, "evt_down", Utc::now().timestamp()).build())
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(response).await["error"],
        "Webhook verification unavailable"
    );

    let entries = app.wait_for_audit(AuditAction::WebhookRejected, 1).await;
    assert_eq!(entries[0].metadata["reason"], "nonce_store_unavailable");
}

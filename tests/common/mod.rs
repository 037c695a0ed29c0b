//! Shared harness for integration tests: an in-memory perimeter with a
//! host route mounted behind it.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use security_perimeter::audit::{AuditAction, AuditLogEntry, MemoryAuditStore};
use security_perimeter::http::{AppState, Collaborators, HttpServer};
use security_perimeter::lifecycle::Shutdown;
use security_perimeter::quarantine::{MemoryBlobStore, MemoryQuarantineRepository};
use security_perimeter::security::SessionVerifier;
use security_perimeter::webhook::{MemoryNonceStore, NonceStore, WebhookVerifier};
use security_perimeter::PerimeterConfig;

pub const APP_ORIGIN: &str = "http://localhost:3000";
pub const ADMIN_ID: &str = "admin-1";
pub const USER_ID: &str = "user-1";
pub const SESSION_SECRET: &str = "test-session-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const FIELD_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Valid configuration with every secret filled in.
pub fn test_config() -> PerimeterConfig {
    let mut config = PerimeterConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.app.url = APP_ORIGIN.into();
    config.app.production = true;
    config.session.secret = SESSION_SECRET.into();
    config.webhook.secret = WEBHOOK_SECRET.into();
    config.encryption.key = FIELD_KEY.into();
    config.audit.ip_hash_secret = "test-ip-secret".into();
    config.admin.user_ids = vec![ADMIN_ID.into()];
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub audit_store: Arc<MemoryAuditStore>,
    pub repo: Arc<MemoryQuarantineRepository>,
    pub blobs: Arc<MemoryBlobStore>,
    pub sessions: SessionVerifier,
    pub webhooks: WebhookVerifier,
    pub shutdown: Shutdown,
    server: Option<HttpServer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PerimeterConfig) -> Self {
        Self::with_nonce_store(config, Arc::new(MemoryNonceStore::new()))
    }

    pub fn with_nonce_store(config: PerimeterConfig, nonce_store: Arc<dyn NonceStore>) -> Self {
        let audit_store = Arc::new(MemoryAuditStore::new());
        let repo = Arc::new(MemoryQuarantineRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let shutdown = Shutdown::new();

        let collaborators = Collaborators {
            audit_store: audit_store.clone(),
            quarantine_repo: repo.clone(),
            blob_store: blobs.clone(),
            nonce_store,
        };

        let sessions = SessionVerifier::new(&config.session.secret, config.session.cookie_name.clone())
            .unwrap();
        let webhooks = WebhookVerifier::new(&config.webhook.secret).unwrap();

        let server = HttpServer::new(config, collaborators)
            .unwrap()
            .with_app_routes(Router::new().route("/api/budget", post(save_budget).get(get_budget)));

        Self {
            router: server.router(),
            state: server.state().clone(),
            audit_store,
            repo,
            blobs,
            sessions,
            webhooks,
            shutdown,
            server: Some(server),
        }
    }

    /// Hand the server over for a real TCP run.
    pub fn take_server(&mut self) -> HttpServer {
        self.server.take().expect("server already taken")
    }

    pub fn session(&self, user_id: &str) -> String {
        self.sessions.sign(user_id)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Poll the audit store until `count` entries for `action` have landed.
    pub async fn wait_for_audit(&self, action: AuditAction, count: usize) -> Vec<AuditLogEntry> {
        for _ in 0..100 {
            let entries = self.audit_store.by_action(action).await;
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.audit_store.by_action(action).await
    }
}

async fn save_budget(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "saved": true, "budget": body }))
}

async fn get_budget() -> Json<Value> {
    Json(json!({ "budget": [] }))
}

/// Builder for requests carrying the usual browser headers.
pub struct Req {
    method: Method,
    uri: String,
    cookies: Vec<String>,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Req {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            cookies: Vec::new(),
            headers: Vec::new(),
            body: Body::empty(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(format!("{name}={value}"));
        self
    }

    pub fn session(self, token: &str) -> Self {
        self.cookie("session-token", token)
    }

    /// Matching CSRF cookie and header.
    pub fn csrf(self, token: &str) -> Self {
        self.cookie("csrf-token", token).header("x-csrf-token", token)
    }

    pub fn origin(self, origin: &str) -> Self {
        self.header("origin", origin)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        self.body = Body::from(value.to_string());
        self
    }

    pub fn bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = Body::from(bytes);
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if !self.cookies.is_empty() {
            builder = builder.header(header::COOKIE, self.cookies.join("; "));
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(self.body).unwrap()
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared state from config and collaborators
//! - Create the Axum router: perimeter routes, admin API, host app routes
//! - Wire up middleware (security, tracing, limits, request id)
//! - Serve until shutdown, then let the audit worker drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::audit::{AuditLogger, AuditStore, AuditWorker};
use crate::config::PerimeterConfig;
use crate::error::Result;
use crate::http::{handlers, middleware::security_middleware};
use crate::quarantine::{BlobStore, ContentInspector, QuarantineManager, QuarantineRepository};
use crate::security::{CsrfGuard, PolicyHandle, SecurityPolicy, SessionVerifier};
use crate::webhook::{NonceStore, WebhookReplayGuard, WebhookVerifier};

/// External stores the perimeter talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub audit_store: Arc<dyn AuditStore>,
    pub quarantine_repo: Arc<dyn QuarantineRepository>,
    pub blob_store: Arc<dyn BlobStore>,
    pub nonce_store: Arc<dyn NonceStore>,
}

#[derive(Debug, Clone)]
pub struct WebhookHeaderNames {
    pub id_header: String,
    pub timestamp_header: String,
    pub signature_header: String,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub policy: PolicyHandle,
    pub csrf: Arc<CsrfGuard>,
    pub sessions: Arc<SessionVerifier>,
    pub audit: AuditLogger,
    pub replay: WebhookReplayGuard,
    pub webhooks: Arc<WebhookVerifier>,
    pub webhook_headers: Arc<WebhookHeaderNames>,
    pub quarantine: QuarantineManager,
    pub inspector: Arc<ContentInspector>,
    pub uploads: Arc<dyn BlobStore>,
    pub upload_namespace: Arc<str>,
    pub retention_days: u32,
}

impl AppState {
    /// Assemble state and start the audit drain worker.
    pub fn build(
        config: &PerimeterConfig,
        collaborators: Collaborators,
    ) -> Result<(Self, AuditWorker)> {
        let (audit, audit_worker) = AuditLogger::spawn(collaborators.audit_store, &config.audit)?;

        let state = Self {
            policy: PolicyHandle::new(SecurityPolicy::from_config(config)?),
            csrf: Arc::new(CsrfGuard::from_config(&config.csrf, config.app.production)),
            sessions: Arc::new(SessionVerifier::new(
                &config.session.secret,
                config.session.cookie_name.clone(),
            )?),
            replay: WebhookReplayGuard::new(
                collaborators.nonce_store,
                Duration::from_secs(config.webhook.tolerance_secs),
                audit.clone(),
            ),
            webhooks: Arc::new(WebhookVerifier::new(&config.webhook.secret)?),
            webhook_headers: Arc::new(WebhookHeaderNames {
                id_header: config.webhook.id_header.to_ascii_lowercase(),
                timestamp_header: config.webhook.timestamp_header.to_ascii_lowercase(),
                signature_header: config.webhook.signature_header.to_ascii_lowercase(),
            }),
            quarantine: QuarantineManager::new(
                collaborators.quarantine_repo,
                collaborators.blob_store.clone(),
                audit.clone(),
                config.quarantine.namespace.clone(),
            ),
            inspector: Arc::new(ContentInspector::from_config(&config.quarantine)),
            uploads: collaborators.blob_store,
            upload_namespace: Arc::from(config.quarantine.upload_namespace.as_str()),
            retention_days: config.audit.retention_days,
            audit,
        };
        Ok((state, audit_worker))
    }
}

/// HTTP server for the security perimeter.
pub struct HttpServer {
    router: Router,
    config: PerimeterConfig,
    state: AppState,
    audit_worker: AuditWorker,
}

impl HttpServer {
    pub fn new(
        config: PerimeterConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let (state, audit_worker) = AppState::build(&config, collaborators)?;
        let router = build_router(&config, state.clone(), Router::new());
        Ok(Self {
            router,
            config,
            state,
            audit_worker,
        })
    }

    /// Put host application routes behind the perimeter.
    pub fn with_app_routes(mut self, routes: Router<AppState>) -> Self {
        self.router = build_router(&self.config, self.state.clone(), routes);
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &PerimeterConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    ///
    /// The audit worker is stopped only after every in-flight request has
    /// completed, so entries logged while connections drain are kept.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::result::Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        self.audit_worker.stop().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &PerimeterConfig, state: AppState, app_routes: Router<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/csrf", get(handlers::csrf_token))
        .route("/api/uploads", post(handlers::upload))
        .route("/api/webhooks/{source}", post(handlers::webhook))
        .nest("/api/admin", admin::admin_router())
        .merge(app_routes)
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), security_middleware))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

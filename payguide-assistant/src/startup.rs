//! Router construction and server lifecycle.

use crate::config::PayGuideConfig;
use crate::handlers::{
    admin::{admin_page, clear_cache, login, logout, publish, upload},
    app::{health_check, index, readiness_check},
    chat::{ask, clear, transcript},
    diagnostics::diagnostics,
    metrics::metrics,
};
use crate::middleware::admin::admin_middleware;
use crate::services::providers::gemini::{GeminiConfig, GeminiProvider};
use crate::services::providers::TextProvider;
use crate::AppState;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, request_span},
};
use std::future::Future;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(server.session_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            server.session_inactivity_hours,
        )));

    let admin_routes = Router::new()
        .route("/admin/upload", post(upload))
        .route("/admin/publish", post(publish))
        .route("/admin/cache/clear", post(clear_cache))
        .route_layer(from_fn(admin_middleware));

    Router::new()
        .route("/", get(index))
        .route("/chat", post(ask))
        .route("/chat/clear", post(clear))
        .route("/chat/transcript", get(transcript))
        .route("/admin", get(admin_page))
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .merge(admin_routes)
        .route("/diagnostics", get(diagnostics))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest_service("/static", ServeDir::new(&server.static_dir))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// A bound listener plus the state it will serve.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build with the Gemini provider described by `config`.
    pub async fn build(config: PayGuideConfig) -> Result<Self, AppError> {
        let provider = GeminiProvider::new(GeminiConfig::from(&config.gemini)).map_err(|e| {
            tracing::error!("Failed to initialize Gemini provider: {}", e);
            AppError::ConfigError(anyhow::anyhow!("Gemini provider: {}", e))
        })?;

        tracing::info!(
            model = %config.gemini.model,
            base_url = %config.gemini.api_base_url,
            "Initialized Gemini provider"
        );

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build around any provider. Port 0 binds a random port.
    pub async fn build_with_provider(
        config: PayGuideConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        let address = format!("{}:{}", config.server.listen.host, config.server.listen.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState::new(config, provider);

        if !state.store.exists().await {
            tracing::warn!(
                path = %state.store.path().display(),
                "Pay Guide PDF missing; questions fail until an admin uploads one"
            );
        }

        tracing::info!(port, "payguide-assistant listening");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves, letting in-flight requests finish.
    pub async fn run_with_shutdown<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                tracing::error!("Server error: {}", e);
                e
            })
    }
}

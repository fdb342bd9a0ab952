//! RedGifs Media Proxy
//!
//! Single-binary Rust service that:
//! 1. Resolves an access token (user refresh flow preferred, anonymous
//!    session fallback)
//! 2. Forwards `/api/*` requests to api.redgifs.com with the token attached
//! 3. Retries on upstream 401 after invalidating cached credentials
//! 4. Streams allowlisted media through `/api/media`

mod auth;
mod config;
mod media;
mod metrics;
mod proxy;
#[cfg(test)]
mod test_util;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use redgifs_auth::{AuthClient, SessionStore, TokenManager};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::metrics::ServiceMetrics;

/// Time allowed for in-flight requests to drain after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub client: reqwest::Client,
    pub api_base: String,
    pub timeout: Duration,
    pub allowed_hosts: Arc<Vec<String>>,
    pub metrics: ServiceMetrics,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// `/api/media` must be routed before the `/api/{*path}` catch-all so media
/// fetches bypass the token-attaching dispatcher.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/status", get(auth::status_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/api/media", get(media::media_handler))
        .route("/api/{*path}", any(api_handler))
        .layer(CorsLayer::permissive())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting redgifs-media-proxy");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.proxy.listen_addr,
        api_base = %config.proxy.api_base,
        session_file = config.auth.session_file.is_some(),
        allowed_hosts = config.media.allowed_hosts.len(),
        "configuration loaded"
    );

    let client = reqwest::Client::new();
    let sessions = Arc::new(SessionStore::new(config.auth.session_file.clone()));
    let auth = AuthClient::with_endpoints(
        client.clone(),
        config.auth.token_endpoint.clone(),
        config.auth.temporary_endpoint.clone(),
    );
    let tokens = Arc::new(TokenManager::new(auth, sessions.clone()));

    if sessions.is_configured().await {
        info!("refresh token configured, user flow enabled");
    } else {
        info!("no refresh token configured, running anonymously");
    }

    let app_state = AppState {
        tokens,
        client,
        api_base: config.proxy.api_base.clone(),
        timeout: Duration::from_secs(config.proxy.timeout_secs),
        allowed_hosts: Arc::new(config.media.allowed_hosts.clone()),
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };
    let metrics = app_state.metrics.clone();

    let app = build_router(app_state, config.proxy.max_connections);

    let listen_addr = config.proxy.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. DRAIN_TIMEOUT bounds the drain so a slow client cannot block exit
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            let served = metrics.requests_total.load(Ordering::Relaxed);
            warn!(
                requests_served = served,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: JSON with status, uptime, requests served.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let errors = state.metrics.errors_total.load(Ordering::Relaxed);

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "ok",
            "uptime_seconds": uptime,
            "requests_served": requests,
            "errors_total": errors,
        })
        .to_string(),
    )
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Catch-all handler that dispatches `/api/*` requests upstream.
async fn api_handler(
    State(state): State<AppState>,
    request: axum::http::Request<Body>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    proxy::proxy_request(&state, request, request_id).await
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

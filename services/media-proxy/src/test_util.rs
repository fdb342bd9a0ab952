//! Shared fixtures for handler tests: an in-process mock auth server, an
//! echo upstream, and an `AppState` builder wired to both.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use redgifs_auth::{AuthClient, Session, SessionStore, TokenManager};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::AppState;
use crate::metrics::ServiceMetrics;

/// Recorder handle that is not installed globally, so parallel tests do not
/// fight over the process-wide recorder.
pub fn test_prometheus_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Scriptable mock for both auth endpoints, with mint counters.
pub struct MockAuth {
    pub user_mints: AtomicU64,
    pub anon_mints: AtomicU64,
    user_response: Mutex<(u16, serde_json::Value)>,
    anon_response: Mutex<(u16, serde_json::Value)>,
    pub last_session_param: Mutex<Option<String>>,
}

impl MockAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            user_mints: AtomicU64::new(0),
            anon_mints: AtomicU64::new(0),
            user_response: Mutex::new((
                200,
                serde_json::json!({"id_token": "jwt_user", "access_token": "at_user", "expires_in": 3600}),
            )),
            anon_response: Mutex::new((
                200,
                serde_json::json!({"token": "anon_tok", "session": "sess_1"}),
            )),
            last_session_param: Mutex::new(None),
        })
    }

    pub fn set_user_response(&self, status: u16, body: serde_json::Value) {
        *self.user_response.lock().unwrap() = (status, body);
    }

    pub fn set_anon_response(&self, status: u16, body: serde_json::Value) {
        *self.anon_response.lock().unwrap() = (status, body);
    }
}

async fn user_handler(State(mock): State<Arc<MockAuth>>) -> impl IntoResponse {
    mock.user_mints.fetch_add(1, Ordering::SeqCst);
    let (status, body) = mock.user_response.lock().unwrap().clone();
    (StatusCode::from_u16(status).unwrap(), axum::Json(body))
}

async fn anon_handler(
    State(mock): State<Arc<MockAuth>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    mock.anon_mints.fetch_add(1, Ordering::SeqCst);
    *mock.last_session_param.lock().unwrap() = params.get("session_id").cloned();
    let (status, body) = mock.anon_response.lock().unwrap().clone();
    (StatusCode::from_u16(status).unwrap(), axum::Json(body))
}

/// Bind the mock auth server and return its base URL.
pub async fn start_auth_server(mock: Arc<MockAuth>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new()
        .route("/oauth2/token", post(user_handler))
        .route("/v2/auth/temporary", get(anon_handler))
        .with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

/// Upstream that echoes method, path, query, body, and headers back as JSON.
pub async fn start_echo_server() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let app = axum::Router::new().fallback(echo_handler);
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), handle)
}

async fn echo_handler(request: Request<Body>) -> impl IntoResponse {
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(str::to_owned);

    let mut echoed_headers = serde_json::Map::new();
    for (name, value) in request.headers() {
        if let Ok(v) = value.to_str() {
            echoed_headers.insert(name.as_str().to_owned(), serde_json::json!(v));
        }
    }

    let body = axum::body::to_bytes(request.into_body(), 1024 * 1024)
        .await
        .unwrap_or_default();

    axum::Json(serde_json::json!({
        "method": method,
        "path": path,
        "query": query,
        "body": String::from_utf8_lossy(&body),
        "echoed_headers": echoed_headers,
    }))
}

/// Persist a session file carrying the given refresh secret; returns its path.
pub async fn write_session(dir: &tempfile::TempDir, refresh_token: &str) -> std::path::PathBuf {
    let path = dir.path().join("session.json");
    let store = SessionStore::new(Some(path.clone()));
    store
        .save(&Session {
            refresh_token: refresh_token.into(),
            access_token: None,
            id_token: None,
            expires_at: None,
        })
        .await
        .unwrap();
    path
}

/// App state wired to the given upstream and auth server.
pub async fn test_state(
    api_base: &str,
    auth_base: &str,
    session_file: Option<std::path::PathBuf>,
) -> AppState {
    test_state_with_timeout(api_base, auth_base, session_file, Duration::from_secs(5)).await
}

/// As [`test_state`], with an explicit upstream timeout for tests that
/// exercise the timeout path.
pub async fn test_state_with_timeout(
    api_base: &str,
    auth_base: &str,
    session_file: Option<std::path::PathBuf>,
    timeout: Duration,
) -> AppState {
    let client = reqwest::Client::new();
    let sessions = Arc::new(SessionStore::new(session_file));
    let auth = AuthClient::with_endpoints(
        client.clone(),
        format!("{auth_base}/oauth2/token"),
        format!("{auth_base}/v2/auth/temporary"),
    );
    let tokens = Arc::new(TokenManager::new(auth, sessions));

    AppState {
        tokens,
        client,
        api_base: api_base.to_owned(),
        timeout,
        allowed_hosts: Arc::new(vec!["redgifs.com".to_owned(), "127.0.0.1".to_owned()]),
        metrics: ServiceMetrics::new(),
        prometheus: test_prometheus_handle(),
    }
}

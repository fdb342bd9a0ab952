//! Authentication endpoints
//!
//! `POST /auth/login` validates a refresh secret by minting against the
//! upstream, persists it to the session file, and primes the user cache.
//! `POST /auth/logout` deletes the persisted session. `GET /status` reports
//! the current mode and cache occupancy without minting anything.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::proxy::error_response;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    refresh_token: Option<String>,
}

/// `POST /auth/login`
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let request_id = format!("req_{}", Uuid::new_v4().as_simple());

    let refresh_token = match request.refresh_token.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_owned(),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "missing refresh_token",
                &request_id,
            );
        }
    };

    match state.tokens.login(&refresh_token).await {
        Ok(_) => {
            info!("user login succeeded");
            Json(serde_json::json!({"success": true})).into_response()
        }
        Err(e) => {
            warn!(error = %e, "login failed");
            error_response(StatusCode::UNAUTHORIZED, "invalid refresh token", &request_id)
        }
    }
}

/// `POST /auth/logout`
pub async fn logout_handler(State(state): State<AppState>) -> Response {
    let request_id = format!("req_{}", Uuid::new_v4().as_simple());
    match state.tokens.logout().await {
        Ok(()) => {
            info!("user logged out");
            Json(serde_json::json!({"success": true})).into_response()
        }
        Err(e) => {
            warn!(error = %e, "logout failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to clear session",
                &request_id,
            )
        }
    }
}

/// `GET /status` — observational only, never mints.
pub async fn status_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let configured = state.tokens.refresh_secret_configured().await;
    let cache = state.tokens.cache_status().await;

    let mode = if cache.user_valid {
        "authenticated"
    } else {
        "anonymous"
    };

    Json(serde_json::json!({
        "mode": mode,
        "refreshTokenConfigured": configured,
        "userTokenCached": cache.user_cached,
        "anonTokenCached": cache.anon_cached,
    }))
}

//! Media passthrough
//!
//! `GET /api/media?url=<cdn url>` streams media bytes through the proxy so
//! the browser never talks to the CDN directly. Only hosts on the configured
//! allowlist (exact match or subdomain) are fetched. `Range` requests are
//! forwarded for video seeking, and the relevant caching and range headers
//! pass through from the upstream response.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, instrument};

use crate::AppState;
use crate::metrics::record_upstream_error;
use crate::proxy::error_response;

/// Upstream response headers forwarded to the client.
const FORWARDED_HEADERS: &[header::HeaderName] = &[
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::CACHE_CONTROL,
    header::ETAG,
    header::LAST_MODIFIED,
];

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    url: Option<String>,
}

/// Host allowlist check: exact match or subdomain of an allowed host.
fn host_allowed(host: &str, allowed: &[String]) -> bool {
    allowed
        .iter()
        .any(|h| host == h || host.ends_with(&format!(".{h}")))
}

#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn media_request(
    state: &AppState,
    headers: &HeaderMap,
    params: MediaQuery,
    request_id: String,
) -> Response {
    let Some(url) = params.url else {
        return error_response(StatusCode::BAD_REQUEST, "missing url parameter", &request_id);
    };

    let parsed = match reqwest::Url::parse(&url) {
        Ok(u) => u,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid url parameter", &request_id);
        }
    };

    let host = parsed.host_str().unwrap_or("");
    if !host_allowed(host, &state.allowed_hosts) {
        return error_response(
            StatusCode::FORBIDDEN,
            "url host is not on the allowlist",
            &request_id,
        );
    }

    let mut req = state
        .client
        .get(parsed)
        .header(header::USER_AGENT, redgifs_auth::USER_AGENT)
        .header(header::ORIGIN, redgifs_auth::ORIGIN)
        .header(header::REFERER, redgifs_auth::REFERER)
        .timeout(state.timeout);

    // Range passes through so the player can seek
    if let Some(range) = headers.get(header::RANGE) {
        req = req.header(header::RANGE, range);
    }

    let upstream = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            record_upstream_error("media_transport");
            error!(error = %e, "media fetch failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("media fetch failed: {e}"),
                &request_id,
            );
        }
    };

    let status = upstream.status();
    let mut builder = Response::builder().status(status);
    for name in FORWARDED_HEADERS {
        if let Some(value) = upstream.headers().get(name) {
            builder = builder.header(name, value);
        }
    }
    if !upstream.headers().contains_key(header::ACCEPT_RANGES) {
        builder = builder.header(header::ACCEPT_RANGES, "bytes");
    }

    match builder.body(Body::from_stream(upstream.bytes_stream())) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to build media response");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to build media response",
                &request_id,
            )
        }
    }
}

/// Handler for `GET /api/media`.
pub async fn media_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<MediaQuery>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    media_request(&state, &headers, params, request_id)
        .await
        .into_response()
}

//! API proxy dispatcher
//!
//! Forwards inbound `/api/*` requests to the upstream resource API with the
//! selected credential attached, and drives the bounded retry-with-refresh
//! loop: an upstream 401 invalidates both credential cache slots and the
//! request is re-dispatched with a forced refresh, up to `RETRY_LIMIT`
//! retries. Any other upstream status passes through verbatim — the
//! dispatcher never reinterprets upstream error semantics.

use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, instrument, warn};

use crate::AppState;
use crate::metrics::{record_request, record_upstream_error};

/// Maximum number of invalidate-and-retry cycles per inbound request.
pub const RETRY_LIMIT: u32 = 3;

/// Inbound request body cap
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// JSON error body: {"error":"...","requestId":"req_..."}
pub fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": message,
        "requestId": request_id,
    });
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Catch-all handler for `/api/{*path}`.
#[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.uri().path()))]
pub async fn proxy_request(
    state: &AppState,
    request: Request<Body>,
    request_id: String,
) -> Response {
    state
        .metrics
        .requests_total
        .fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();

    // The inbound route is /api/<upstream path>; the upstream does not
    // carry the /api prefix.
    let path = uri
        .path()
        .strip_prefix("/api")
        .unwrap_or(uri.path())
        .trim_start_matches('/')
        .to_owned();
    let query = uri.query().map(str::to_owned);

    let body_bytes = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "failed to read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {e}"),
                &request_id,
            );
        }
    };

    let response = dispatch(
        state,
        method.clone(),
        &path,
        query.as_deref(),
        body_bytes,
        &request_id,
    )
    .await;

    record_request(
        response.status().as_u16(),
        method.as_str(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Issue the upstream call, retrying on 401 with forced cache invalidation.
async fn dispatch(
    state: &AppState,
    method: Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
    request_id: &str,
) -> Response {
    let mut url = format!("{}/{}", state.api_base.trim_end_matches('/'), path);
    if let Some(q) = query {
        url.push('?');
        url.push_str(q);
    }

    // One extra attempt is granted for a timed-out upstream call; other
    // transport failures are not retried.
    let mut timeout_retried = false;
    let mut attempt: u32 = 0;

    loop {
        // Past the first attempt the cached credential is suspect, so the
        // selector must bypass the cache.
        let credential = match state.tokens.get_access_token(attempt > 0).await {
            Ok(c) => c,
            Err(e) => {
                state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                record_upstream_error("acquisition");
                error!(error = %e, "token acquisition failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "token acquisition failed",
                    request_id,
                );
            }
        };

        let mut req = state
            .client
            .request(method.clone(), &url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", credential.token),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, redgifs_auth::USER_AGENT)
            .header(header::ORIGIN, redgifs_auth::ORIGIN)
            .header(header::REFERER, redgifs_auth::REFERER)
            .timeout(state.timeout);

        // The session id header rides along only in anonymous mode
        if !credential.is_authenticated {
            if let Some(sid) = credential.session_id.as_deref() {
                req = req.header(redgifs_auth::SESSION_ID_HEADER, sid);
            }
        }

        if method != Method::GET && method != Method::HEAD && !body.is_empty() {
            req = req.body(body.clone());
        }

        match req.send().await {
            Ok(upstream) => {
                let status = upstream.status();

                if status == StatusCode::UNAUTHORIZED && attempt < RETRY_LIMIT {
                    debug!(
                        retry = attempt + 1,
                        "upstream 401, invalidating credentials and retrying"
                    );
                    state.tokens.invalidate_all().await;
                    attempt += 1;
                    continue;
                }

                let bytes = match upstream.bytes().await {
                    Ok(b) => b,
                    Err(e) => {
                        state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                        record_upstream_error("read");
                        error!(error = %e, "failed to read upstream response body");
                        return error_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "failed to read upstream response",
                            request_id,
                        );
                    }
                };

                if !bytes.is_empty()
                    && serde_json::from_slice::<serde_json::Value>(&bytes).is_err()
                {
                    state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                    record_upstream_error("parse");
                    error!(status = status.as_u16(), "upstream returned malformed JSON");
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "upstream returned malformed JSON",
                        request_id,
                    );
                }

                // Status and body pass through verbatim, including a 401
                // once the retry budget is exhausted
                return (
                    status,
                    [(header::CONTENT_TYPE, "application/json")],
                    bytes,
                )
                    .into_response();
            }
            Err(e) if e.is_timeout() && !timeout_retried => {
                warn!(error = %e, "upstream timeout, retrying once");
                timeout_retried = true;
            }
            Err(e) if e.is_timeout() => {
                state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                record_upstream_error("timeout");
                error!(error = %e, "upstream timeout after retry");
                return error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    &format!("upstream timeout after {}s", state.timeout.as_secs()),
                    request_id,
                );
            }
            Err(e) => {
                state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                record_upstream_error("transport");
                error!(error = %e, "upstream request failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("upstream error: {e}"),
                    request_id,
                );
            }
        }
    }
}

//! Token endpoint wire calls
//!
//! The two mint flows against the upstream auth endpoints:
//! 1. User refresh-token exchange — POST to the OAuth token endpoint with the
//!    long-lived refresh secret carried in a cookie
//! 2. Anonymous session bootstrap — GET to the temporary-token endpoint,
//!    optionally passing the previous session id for continuity
//!
//! Both attach the browser identification headers the upstream expects.

use serde::Deserialize;

use crate::constants::{
    ORIGIN, REDGIFS_CLIENT_ID, REFERER, TEMPORARY_ENDPOINT, TOKEN_ENDPOINT, USER_AGENT,
};
use crate::error::{Error, Result};

/// Response from the user token endpoint.
///
/// The upstream may return either or both of `id_token` and `access_token`.
/// `expires_in` is a delta in seconds from the response time; the caller
/// converts it to an absolute unix-millisecond timestamp when caching.
#[derive(Debug, Deserialize)]
pub struct UserTokenResponse {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    /// Seconds until the token expires (delta, not absolute)
    pub expires_in: Option<u64>,
}

impl UserTokenResponse {
    /// The token to use in subsequent `Authorization: Bearer` headers.
    ///
    /// The upstream resource API validates the signed `id_token`, not the
    /// raw OAuth `access_token`, so `id_token` wins when both are present.
    /// Returns `None` when the response carries neither.
    pub fn bearer_token(self) -> Option<String> {
        self.id_token.or(self.access_token)
    }
}

/// Response from the anonymous token endpoint.
#[derive(Debug, Deserialize)]
pub struct AnonTokenResponse {
    pub token: String,
    /// Session id to reuse on the next anonymous mint
    pub session: String,
}

/// HTTP client for the two mint flows.
///
/// Endpoints are injectable so tests can point at an in-process mock server;
/// production uses the constants.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    token_url: String,
    temporary_url: String,
}

impl AuthClient {
    /// Client against the real upstream auth endpoints.
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoints(http, TOKEN_ENDPOINT.into(), TEMPORARY_ENDPOINT.into())
    }

    /// Client against custom endpoints (mock servers in tests).
    pub fn with_endpoints(http: reqwest::Client, token_url: String, temporary_url: String) -> Self {
        Self {
            http,
            token_url,
            temporary_url,
        }
    }

    /// Exchange a long-lived refresh secret for a short-lived user token.
    ///
    /// The refresh secret rides in a cookie, not the form body — that is how
    /// the upstream's own web client performs the exchange.
    pub async fn refresh_user_token(&self, refresh_secret: &str) -> Result<UserTokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ORIGIN, ORIGIN)
            .header(reqwest::header::REFERER, REFERER)
            .header(
                reqwest::header::COOKIE,
                format!("refresh_token={refresh_secret}"),
            )
            .form(&[
                ("client_id", REDGIFS_CLIENT_ID),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<UserTokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
    }

    /// Mint an anonymous session token.
    ///
    /// `session_id` is the continuity hint from the previously cached
    /// credential; passing it back makes the upstream treat consecutive
    /// mints as the same logical session.
    pub async fn mint_anonymous(&self, session_id: Option<&str>) -> Result<AnonTokenResponse> {
        let mut request = self
            .http
            .get(&self.temporary_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ORIGIN, ORIGIN)
            .header(reqwest::header::REFERER, REFERER);

        if let Some(sid) = session_id {
            request = request.query(&[("session_id", sid)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("anonymous mint request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::AnonMint(format!(
                "temporary endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<AnonTokenResponse>()
            .await
            .map_err(|e| Error::AnonMint(format!("invalid temporary token response: {e}")))
    }
}

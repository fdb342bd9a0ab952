//! Credential cache and token selection
//!
//! `TokenManager` owns the two credential cache slots and implements the
//! selection contract the proxy dispatcher consumes:
//!
//! - user token preferred, anonymous fallback, re-evaluated on every call
//! - cached credentials returned while valid unless a forced refresh is
//!   requested
//! - a failed user mint is non-fatal and falls through to the anonymous
//!   path; a failed anonymous mint has no further fallback and propagates
//!
//! The whole selection runs under one async mutex, so concurrent requests
//! that both observe an expired credential await a single refresh instead
//! of racing the token endpoint.

use std::sync::Arc;

use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::constants::{ANON_TTL_SECS, DEFAULT_USER_TTL_SECS};
use crate::credentials::{AccessToken, AnonCredential, CredentialCache, UserCredential};
use crate::error::{Error, Result};
use crate::session::{Session, SessionStore};
use crate::token::AuthClient;

/// Observational snapshot of the cache slots for the status endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CacheStatus {
    pub user_cached: bool,
    pub anon_cached: bool,
    /// Whether the cached user credential is currently unexpired
    pub user_valid: bool,
}

/// Process-wide credential cache and selector. Constructed once and shared
/// by reference; lives for the process lifetime and is rebuilt from the
/// session store on restart.
pub struct TokenManager {
    auth: AuthClient,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    cache: Mutex<CredentialCache>,
}

impl TokenManager {
    pub fn new(auth: AuthClient, sessions: Arc<SessionStore>) -> Self {
        Self::with_clock(auth, sessions, Arc::new(SystemClock))
    }

    /// Constructor with an injected clock for deterministic expiry tests.
    pub fn with_clock(
        auth: AuthClient,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auth,
            sessions,
            clock,
            cache: Mutex::new(CredentialCache::default()),
        }
    }

    /// Resolve the best available credential.
    ///
    /// Fails only when both the user and anonymous acquisitions fail; the
    /// caller surfaces that as a 500-class response.
    pub async fn get_access_token(&self, force_refresh: bool) -> Result<AccessToken> {
        let mut cache = self.cache.lock().await;

        if let Some(secret) = self.sessions.refresh_secret().await {
            let now = self.clock.now_millis();
            if !force_refresh {
                if let Some(user) = cache.user.as_ref().filter(|u| u.is_valid(now)) {
                    return Ok(AccessToken {
                        token: user.access_token.clone(),
                        session_id: None,
                        is_authenticated: true,
                    });
                }
            }

            match self.mint_user(&secret).await {
                Ok(credential) => {
                    debug!("user token refreshed");
                    metrics::counter!("token_refresh_total", "flow" => "user", "outcome" => "success")
                        .increment(1);
                    let token = AccessToken {
                        token: credential.access_token.clone(),
                        session_id: None,
                        is_authenticated: true,
                    };
                    cache.user = Some(credential);
                    return Ok(token);
                }
                // Authentication is a preference, not a requirement: most
                // read endpoints work anonymously, so a failed user mint
                // falls through instead of propagating.
                Err(e) => {
                    metrics::counter!("token_refresh_total", "flow" => "user", "outcome" => "failure")
                        .increment(1);
                    warn!(error = %e, "user token refresh failed, falling back to anonymous");
                }
            }
        }

        let now = self.clock.now_millis();
        if !force_refresh {
            if let Some(anon) = cache.anon.as_ref().filter(|a| a.is_valid(now)) {
                return Ok(AccessToken {
                    token: anon.token.clone(),
                    session_id: Some(anon.session_id.clone()),
                    is_authenticated: false,
                });
            }
        }

        // Continuity hint: reuse the previous session id even when the
        // token itself has expired or been invalidated.
        let continuity = cache.anon.as_ref().map(|a| a.session_id.clone());
        let response = match self.auth.mint_anonymous(continuity.as_deref()).await {
            Ok(response) => {
                metrics::counter!("token_refresh_total", "flow" => "anonymous", "outcome" => "success")
                    .increment(1);
                response
            }
            Err(e) => {
                metrics::counter!("token_refresh_total", "flow" => "anonymous", "outcome" => "failure")
                    .increment(1);
                return Err(e);
            }
        };

        // Lifetime is measured from mint completion, not from before the
        // network round-trip.
        let minted_at = self.clock.now_millis();
        let credential = AnonCredential {
            token: response.token,
            session_id: response.session,
            expires_at: minted_at.saturating_add(ANON_TTL_SECS * 1_000),
        };
        debug!(session_id = %credential.session_id, "anonymous token minted");
        let token = AccessToken {
            token: credential.token.clone(),
            session_id: Some(credential.session_id.clone()),
            is_authenticated: false,
        };
        cache.anon = Some(credential);
        Ok(token)
    }

    /// Force both cache slots expired. Called by the dispatcher on a 401 —
    /// unscoped because the dispatcher cannot always attribute the failure
    /// to one credential.
    pub async fn invalidate_all(&self) {
        self.cache.lock().await.invalidate_all();
    }

    /// Validate a refresh secret by minting, persist the session, and prime
    /// the user cache slot.
    pub async fn login(&self, refresh_token: &str) -> Result<AccessToken> {
        let response = self.auth.refresh_user_token(refresh_token).await?;
        let expires_in = response.expires_in.unwrap_or(DEFAULT_USER_TTL_SECS);
        let id_token = response.id_token.clone();
        let token = response.bearer_token().ok_or_else(|| {
            Error::TokenExchange("mint response missing both id_token and access_token".into())
        })?;
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(expires_in.saturating_mul(1_000));

        self.sessions
            .save(&Session {
                refresh_token: refresh_token.to_owned(),
                access_token: Some(token.clone()),
                id_token,
                expires_at: Some(expires_at),
            })
            .await?;

        self.cache.lock().await.user = Some(UserCredential {
            access_token: token.clone(),
            expires_at,
        });

        Ok(AccessToken {
            token,
            session_id: None,
            is_authenticated: true,
        })
    }

    /// Delete the persisted session and drop the user cache slot. The
    /// anonymous slot is untouched — anonymous browsing keeps working.
    pub async fn logout(&self) -> Result<()> {
        self.sessions.clear().await?;
        self.cache.lock().await.user = None;
        Ok(())
    }

    /// Whether a user refresh secret is currently resolvable.
    pub async fn refresh_secret_configured(&self) -> bool {
        self.sessions.is_configured().await
    }

    /// Snapshot of the cache slots. Purely observational — never mints.
    pub async fn cache_status(&self) -> CacheStatus {
        let cache = self.cache.lock().await;
        let now = self.clock.now_millis();
        CacheStatus {
            user_cached: cache.user.is_some(),
            anon_cached: cache.anon.is_some(),
            user_valid: cache.user.as_ref().is_some_and(|u| u.is_valid(now)),
        }
    }

    async fn mint_user(&self, secret: &Secret<String>) -> Result<UserCredential> {
        let response = self.auth.refresh_user_token(secret.expose()).await?;
        let expires_in = response.expires_in.unwrap_or(DEFAULT_USER_TTL_SECS);
        let token = response.bearer_token().ok_or_else(|| {
            Error::TokenExchange("mint response missing both id_token and access_token".into())
        })?;
        Ok(UserCredential {
            access_token: token,
            expires_at: self
                .clock
                .now_millis()
                .saturating_add(expires_in.saturating_mul(1_000)),
        })
    }
}

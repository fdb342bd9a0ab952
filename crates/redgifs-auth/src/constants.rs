//! RedGifs OAuth constants
//!
//! Public client configuration matching the platform's own web frontend.
//! These values are not secrets — they identify the public client
//! application. The actual secrets (refresh/access tokens) live in the
//! session store.

/// RedGifs public OAuth client ID (same as the web frontend)
pub const REDGIFS_CLIENT_ID: &str = "e06c34dac7654821bcb37e0393b54350";

/// Token endpoint for the user refresh-token exchange
pub const TOKEN_ENDPOINT: &str = "https://auth2.redgifs.com/oauth2/token";

/// Endpoint for minting anonymous session tokens
pub const TEMPORARY_ENDPOINT: &str = "https://api.redgifs.com/v2/auth/temporary";

/// Base URL of the resource API the proxy forwards to
pub const API_BASE: &str = "https://api.redgifs.com";

/// Browser identification sent on every upstream call. The upstream rejects
/// requests that don't look like its own web client.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";

/// Origin header expected by the upstream
pub const ORIGIN: &str = "https://www.redgifs.com";

/// Referer header expected by the upstream
pub const REFERER: &str = "https://www.redgifs.com/";

/// Header carrying the anonymous session id on proxied requests
pub const SESSION_ID_HEADER: &str = "X-Session-Id";

/// Fallback user-token lifetime (23 hours) when the token endpoint omits
/// `expires_in`
pub const DEFAULT_USER_TTL_SECS: u64 = 82_800;

/// Anonymous token lifetime. Hard-coded to 23 hours because the upstream
/// does not declare one reliably for temporary tokens.
pub const ANON_TTL_SECS: u64 = 82_800;

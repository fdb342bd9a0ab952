//! RedGifs token lifecycle library
//!
//! Credential caching, token acquisition, and session persistence for the
//! media proxy. This crate is a standalone library with no dependency on
//! the proxy binary — it can be tested and used independently.
//!
//! Credential flow:
//! 1. `SessionStore` resolves the long-lived refresh secret (session file
//!    or environment)
//! 2. `TokenManager::get_access_token()` returns a cached credential or
//!    mints one via `AuthClient` — user flow preferred, anonymous fallback
//! 3. The proxy dispatcher attaches the credential and, on a 401, calls
//!    `TokenManager::invalidate_all()` before retrying

pub mod clock;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use constants::*;
pub use credentials::{AccessToken, AnonCredential, CredentialCache, UserCredential};
pub use error::{Error, Result};
pub use manager::{CacheStatus, TokenManager};
pub use session::{REFRESH_TOKEN_ENV, Session, SessionStore};
pub use token::{AnonTokenResponse, AuthClient, UserTokenResponse};

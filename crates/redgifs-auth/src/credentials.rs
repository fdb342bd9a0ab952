//! Cached credential types
//!
//! Two singleton cache slots, one per credential variant. Expiry is an
//! absolute unix-millisecond instant computed at mint time; a credential is
//! valid iff `now < expires_at`. Credentials are never mutated in place —
//! a refresh produces a new value that replaces the slot.

/// Short-lived token minted from the user's refresh secret.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub access_token: String,
    /// Expiration as unix timestamp in milliseconds
    pub expires_at: u64,
}

impl UserCredential {
    pub fn is_valid(&self, now_millis: u64) -> bool {
        now_millis < self.expires_at
    }
}

/// Anonymous session token, tied to an upstream session id.
#[derive(Debug, Clone)]
pub struct AnonCredential {
    pub token: String,
    /// Reused across mints so the upstream sees one logical session
    pub session_id: String,
    /// Expiration as unix timestamp in milliseconds
    pub expires_at: u64,
}

impl AnonCredential {
    pub fn is_valid(&self, now_millis: u64) -> bool {
        now_millis < self.expires_at
    }
}

/// The two cache slots, guarded by one mutex in the manager.
#[derive(Debug, Default)]
pub struct CredentialCache {
    pub user: Option<UserCredential>,
    pub anon: Option<AnonCredential>,
}

impl CredentialCache {
    /// Force both slots expired without dropping them.
    ///
    /// The dispatcher cannot always attribute a 401 to one credential, so
    /// invalidation is unscoped. The anonymous `session_id` survives so the
    /// next mint keeps session continuity.
    pub fn invalidate_all(&mut self) {
        if let Some(user) = self.user.as_mut() {
            user.expires_at = 0;
        }
        if let Some(anon) = self.anon.as_mut() {
            anon.expires_at = 0;
        }
    }
}

/// Resolved credential handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Present only in anonymous mode
    pub session_id: Option<String>,
    pub is_authenticated: bool,
}

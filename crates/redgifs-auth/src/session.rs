//! Session file storage
//!
//! The user's long-lived refresh secret (plus the last minted access token)
//! lives in a JSON session file. Writes use atomic temp-file + rename to
//! prevent corruption on crash, with 0600 permissions since the file holds
//! OAuth tokens. A tokio Mutex serializes concurrent writes from the login
//! endpoint and request-time refresh.
//!
//! The secret is re-read on every acquisition attempt, so replacing the
//! session file takes effect without a restart. When the file is absent or
//! carries no refresh token, the `REDGIFS_REFRESH_TOKEN` environment
//! variable is the fallback source.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Environment variable consulted when the session file has no secret.
pub const REFRESH_TOKEN_ENV: &str = "REDGIFS_REFRESH_TOKEN";

/// On-disk session contents. Field names match the wire/session format the
/// browser UI already understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Expiration of the access token as unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

/// Session file manager.
pub struct SessionStore {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl SessionStore {
    /// Store backed by the given file path. `None` disables persistence,
    /// leaving the environment variable as the only secret source.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Resolve the user refresh secret: session file first, env var second.
    ///
    /// Returns `None` when neither source yields a non-blank value, which
    /// means the user flow is not configured and the selector skips
    /// straight to the anonymous path.
    pub async fn refresh_secret(&self) -> Option<Secret<String>> {
        if let Some(session) = self.load().await {
            let secret = Secret::new(session.refresh_token);
            if !secret.is_blank() {
                return Some(secret);
            }
        }

        match std::env::var(REFRESH_TOKEN_ENV) {
            Ok(value) => {
                let secret = Secret::new(value);
                if secret.is_blank() { None } else { Some(secret) }
            }
            Err(_) => None,
        }
    }

    /// Whether any refresh secret is currently resolvable.
    pub async fn is_configured(&self) -> bool {
        self.refresh_secret().await.is_some()
    }

    /// Read the session file. Missing or malformed files read as `None` —
    /// the caller falls back to the env var or the anonymous flow.
    pub async fn load(&self) -> Option<Session> {
        let path = self.path.as_deref()?;
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring malformed session file");
                None
            }
        }
    }

    /// Persist a session atomically (temp file + rename, 0600).
    pub async fn save(&self, session: &Session) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| Error::Io("session persistence is disabled (no session_file)".into()))?;

        let _guard = self.write_lock.lock().await;
        write_atomic(path, session).await?;
        info!(path = %path.display(), "session saved");
        Ok(())
    }

    /// Delete the session file. Missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!(path = %path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(format!("removing session file: {e}"))),
        }
    }
}

/// Write the session to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target so a crash mid-write cannot corrupt the session.
async fn write_atomic(path: &Path, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)
        .map_err(|e| Error::SessionParse(format!("serializing session: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    // 0600 — the file contains OAuth tokens (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}

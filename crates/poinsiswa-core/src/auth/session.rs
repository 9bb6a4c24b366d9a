use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::vault::SessionCipher;
use crate::api::AuthTokenResponse;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.bin";

/// Refresh this long before the access token actually expires.
const TOKEN_REFRESH_BUFFER_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    Corrupt(String),

    #[error("Session key unavailable: {0}")]
    Keychain(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_token_response(response: AuthTokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            expires_at: now + Duration::seconds(response.expires_in),
            email: response.user.email.unwrap_or_default(),
            user_id: response.user.id,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(TOKEN_REFRESH_BUFFER_SECS)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// The signed-in session, persisted encrypted in the cache directory.
///
/// Without a cipher (keychain unavailable) the session lives in memory only.
pub struct Session {
    cache_dir: PathBuf,
    cipher: Option<SessionCipher>,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf, cipher: Option<SessionCipher>) -> Self {
        Self {
            cache_dir,
            cipher,
            data: None,
        }
    }

    /// Open the session in `cache_dir` using the keychain-held key.
    ///
    /// Keychain problems leave persistence off; a bad session file means
    /// signed out. Neither is an error for the caller.
    pub fn open(cache_dir: PathBuf) -> Self {
        let cipher = match SessionCipher::from_keychain() {
            Ok(cipher) => Some(cipher),
            Err(e) => {
                warn!(error = %e, "Session key unavailable, session will not be remembered");
                None
            }
        };
        let mut session = Self::new(cache_dir, cipher);
        if let Err(e) = session.load() {
            warn!(error = %e, "Discarding unreadable session file");
            if let Err(e) = session.clear() {
                warn!(error = %e, "Failed to remove session file");
            }
        }
        session
    }

    /// Load session from disk. Returns whether a session was found.
    ///
    /// An expired session is still loaded: its refresh token may be usable.
    pub fn load(&mut self) -> Result<bool, SessionError> {
        let Some(cipher) = &self.cipher else {
            return Ok(false);
        };
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }

        let sealed = std::fs::read(&path)?;
        let plain = cipher.decrypt(&sealed)?;
        let data: SessionData =
            serde_json::from_slice(&plain).map_err(|e| SessionError::Corrupt(e.to_string()))?;
        debug!(user_id = %data.user_id, "Loaded saved session");
        self.data = Some(data);
        Ok(true)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<(), SessionError> {
        let (Some(cipher), Some(data)) = (&self.cipher, &self.data) else {
            return Ok(());
        };
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let plain = serde_json::to_vec(data).map_err(|e| SessionError::Corrupt(e.to_string()))?;
        std::fs::write(path, cipher.encrypt(&plain)?)?;
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if a session exists
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.access_token.as_str())
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

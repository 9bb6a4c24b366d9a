//! Session lifecycle: sign in, refresh, sign out, change notifications.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::provider::IdentityProvider;
use super::session::{Session, SessionData};
use crate::error::LedgerResult;

pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    session: Mutex<Session>,
    changes: watch::Sender<Option<SessionData>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, session: Session) -> Self {
        let (changes, _) = watch::channel(session.data.clone());
        Self {
            provider,
            session: Mutex::new(session),
            changes,
        }
    }

    /// Receive the current session whenever it changes (`None` = signed out).
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionData>> {
        self.changes.subscribe()
    }

    fn persist(session: &Session) {
        if let Err(e) = session.save() {
            warn!(error = %e, "Failed to save session");
        }
    }

    fn forget(session: &mut Session) {
        if let Err(e) = session.clear() {
            warn!(error = %e, "Failed to remove saved session");
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> LedgerResult<SessionData> {
        let data = self.provider.sign_in(email, password).await?;
        info!(user_id = %data.user_id, "Signed in");

        let mut session = self.session.lock().await;
        session.update(data.clone());
        Self::persist(&session);
        self.changes.send_replace(Some(data.clone()));
        Ok(data)
    }

    /// Sign out locally, and remotely when possible. The local session is
    /// always cleared.
    pub async fn sign_out(&self) {
        let mut session = self.session.lock().await;
        if let Some(token) = session.token().map(str::to_string) {
            if let Err(e) = self.provider.sign_out(&token).await {
                warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
            }
        }
        Self::forget(&mut session);
        self.changes.send_replace(None);
        info!("Signed out");
    }

    /// The current session, refreshed if it is about to expire.
    ///
    /// Returns `None` when signed out or when an expired session could not
    /// be refreshed.
    pub async fn get_session(&self) -> Option<SessionData> {
        let mut session = self.session.lock().await;
        let current = session.data.clone()?;

        let now = Utc::now();
        if !current.needs_refresh_at(now) {
            return Some(current);
        }

        debug!(user_id = %current.user_id, "Refreshing session");
        match self.provider.refresh(&current.refresh_token).await {
            Ok(mut fresh) => {
                if fresh.email.is_empty() {
                    fresh.email = current.email.clone();
                }
                session.update(fresh.clone());
                Self::persist(&session);
                self.changes.send_replace(Some(fresh.clone()));
                Some(fresh)
            }
            Err(e) if !current.is_expired_at(now) => {
                warn!(error = %e, "Session refresh failed, using current token until it expires");
                Some(current)
            }
            Err(e) => {
                warn!(error = %e, "Session expired and could not be refreshed");
                Self::forget(&mut session);
                self.changes.send_replace(None);
                None
            }
        }
    }
}

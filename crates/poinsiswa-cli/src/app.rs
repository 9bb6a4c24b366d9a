//! Application state shared by the commands: configuration, the backend
//! client, and the current session.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use poinsiswa_core::advice::{AdviceService, GeminiClient};
use poinsiswa_core::api::BackendClient;
use poinsiswa_core::auth::{CredentialStore, Session, SessionData, SessionManager, UserContext};
use poinsiswa_core::config::Config;
use poinsiswa_core::store::RestStore;
use poinsiswa_core::{AuthFailure, LedgerError, PointLedger};

/// A resolved caller together with a ledger bound to their access token.
pub struct SignedIn {
    pub user: UserContext,
    pub ledger: PointLedger,
}

pub struct App {
    /// File-backed settings, written back on login.
    config: Config,
    /// `config` with environment overrides applied.
    settings: Config,
    client: BackendClient,
    sessions: SessionManager,
}

impl App {
    /// The file-backed config, or defaults when it cannot be read.
    pub fn load_config() -> Config {
        match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        }
    }

    pub fn new(config: Config) -> Result<Self> {
        let settings = config.with_env_overrides();
        let backend = settings.backend()?;
        let client = BackendClient::new(&backend.url, &backend.anon_key).context("Failed to create HTTP client")?;

        let cache_dir = Config::cache_dir()?;
        debug!(?cache_dir, "Cache directory configured");
        let sessions = SessionManager::new(Arc::new(client.clone()), Session::open(cache_dir));

        Ok(Self {
            config,
            settings,
            client,
            sessions,
        })
    }

    fn ledger_for(&self, session: &SessionData) -> PointLedger {
        let store = RestStore::new(self.client.with_token(session.access_token.clone()));
        PointLedger::new(Arc::new(store))
    }

    /// The signed-in caller, if there is a usable session.
    pub async fn signed_in(&self) -> Result<Option<SignedIn>> {
        let Some(session) = self.sessions.get_session().await else {
            return Ok(None);
        };
        let ledger = self.ledger_for(&session);
        let user = UserContext::resolve(ledger.store().as_ref(), &session).await?;
        Ok(Some(SignedIn { user, ledger }))
    }

    pub fn school_now(&self) -> Result<DateTime<FixedOffset>> {
        self.settings.school_now()
    }

    pub fn advisor(&self) -> AdviceService {
        let Some(key) = self.settings.advice_api_key.as_deref() else {
            warn!("No advice API key configured, advice is disabled");
            return AdviceService::disabled();
        };
        match GeminiClient::new(key, self.settings.advice_model()) {
            Ok(client) => AdviceService::new(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "Failed to create advice client, advice is disabled");
                AdviceService::disabled()
            }
        }
    }

    fn prompt_email(&self) -> Result<String> {
        let last = self.config.last_email.as_deref();
        match last {
            Some(last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();
        match (input.is_empty(), last) {
            (false, _) => Ok(input.to_string()),
            (true, Some(last)) => Ok(last.to_string()),
            (true, None) => bail!("Email is required"),
        }
    }

    fn prompt_password() -> Result<String> {
        let password = rpassword::prompt_password("Password: ")?;
        Ok(password)
    }

    pub async fn login(&mut self, email: Option<String>, remember: bool) -> Result<UserContext> {
        let email = match email {
            Some(email) => email,
            None => self.prompt_email()?,
        };

        let (password, stored) = match CredentialStore::get_password(&email) {
            Ok(password) => {
                debug!("Using password from keychain");
                (password, true)
            }
            Err(_) => (Self::prompt_password()?, false),
        };

        println!("Signing in...");
        let session = match self.sessions.sign_in(&email, &password).await {
            Ok(session) => session,
            Err(LedgerError::Auth(AuthFailure::InvalidCredentials)) if stored => {
                warn!("Stored password was rejected, removing it");
                if let Err(e) = CredentialStore::delete(&email) {
                    warn!(error = %e, "Failed to delete stored password");
                }
                return Err(LedgerError::Auth(AuthFailure::InvalidCredentials).into());
            }
            Err(e) => return Err(e.into()),
        };

        let ledger = self.ledger_for(&session);
        let user = match UserContext::resolve(ledger.store().as_ref(), &session).await {
            Ok(user) => user,
            Err(e) => {
                // An account without a profile cannot use the application.
                self.sessions.sign_out().await;
                return Err(e.into());
            }
        };

        if remember && !stored {
            if let Err(e) = CredentialStore::store(&email, &password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!(user_id = %user.profile.id, role = %user.profile.role, "Login successful");
        Ok(user)
    }

    pub async fn logout(&mut self, forget: bool) {
        self.sessions.sign_out().await;
        if forget {
            Self::forget_password(&self.config);
        }
    }

    /// Sign out without contacting the backend, for when it is not
    /// configured. Only the saved session and password are removed.
    pub fn logout_local(config: &Config, forget: bool) -> Result<()> {
        Self::clear_saved_session(Config::cache_dir()?)?;
        if forget {
            Self::forget_password(config);
        }
        Ok(())
    }

    fn clear_saved_session(cache_dir: PathBuf) -> Result<()> {
        Session::new(cache_dir, None)
            .clear()
            .context("Failed to remove saved session")
    }

    fn forget_password(config: &Config) {
        if let Some(email) = config.last_email.as_deref() {
            if let Err(e) = CredentialStore::delete(email) {
                warn!(error = %e, "No stored password removed");
            }
        }
    }
}

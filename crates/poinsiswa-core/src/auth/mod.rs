//! Identity and session handling.
//!
//! Sessions come from an external identity provider; this module keeps the
//! current one (encrypted on disk), refreshes it, and resolves the caller's
//! profile into an explicit `UserContext`.

mod context;
mod credentials;
mod manager;
mod provider;
mod session;
mod vault;

pub use context::UserContext;
pub use credentials::CredentialStore;
pub use manager::SessionManager;
pub use provider::IdentityProvider;
pub use session::{Session, SessionData, SessionError};
pub use vault::SessionCipher;

use tracing::warn;

use super::session::SessionData;
use crate::error::{AuthFailure, LedgerError, LedgerResult};
use crate::models::Profile;
use crate::store::LedgerStore;

/// The signed-in caller, passed explicitly to every ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub profile: Profile,
    pub email: String,
}

impl UserContext {
    /// Look up the profile behind a session.
    pub async fn resolve(store: &dyn LedgerStore, session: &SessionData) -> LedgerResult<Self> {
        match store.get_profile(&session.user_id).await? {
            Some(profile) => Ok(Self {
                profile,
                email: session.email.clone(),
            }),
            None => {
                warn!(user_id = %session.user_id, "Signed-in account has no profile");
                Err(LedgerError::Auth(AuthFailure::ProfileMissing))
            }
        }
    }
}

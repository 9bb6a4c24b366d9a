//! The identity provider seam.

use async_trait::async_trait;
use chrono::Utc;

use super::session::SessionData;
use crate::api::{ApiError, BackendClient};
use crate::error::{AuthFailure, LedgerError, LedgerResult};
use crate::store::rest::map_err;

/// Issues and revokes sessions. The ledger never issues sessions itself.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> LedgerResult<SessionData>;

    async fn refresh(&self, refresh_token: &str) -> LedgerResult<SessionData>;

    async fn sign_out(&self, access_token: &str) -> LedgerResult<()>;
}

/// Map an auth endpoint failure. Rejected credentials or refresh tokens come
/// back as 400 (`invalid_grant`) or 401.
fn map_auth_error(err: ApiError, rejected: AuthFailure) -> LedgerError {
    match err {
        ApiError::BadRequest(_) | ApiError::Unauthorized => LedgerError::Auth(rejected),
        other => LedgerError::Storage(map_err(other)),
    }
}

#[async_trait]
impl IdentityProvider for BackendClient {
    async fn sign_in(&self, email: &str, password: &str) -> LedgerResult<SessionData> {
        let response = self
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| map_auth_error(e, AuthFailure::InvalidCredentials))?;
        let mut data = SessionData::from_token_response(response, Utc::now());
        if data.email.is_empty() {
            data.email = email.to_string();
        }
        Ok(data)
    }

    async fn refresh(&self, refresh_token: &str) -> LedgerResult<SessionData> {
        let response = self
            .refresh_session(refresh_token)
            .await
            .map_err(|e| map_auth_error(e, AuthFailure::SessionExpired))?;
        Ok(SessionData::from_token_response(response, Utc::now()))
    }

    async fn sign_out(&self, access_token: &str) -> LedgerResult<()> {
        BackendClient::sign_out(self, access_token)
            .await
            .map_err(|e| map_auth_error(e, AuthFailure::SessionExpired))
    }
}

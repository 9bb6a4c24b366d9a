//! Error taxonomy for ledger operations.
//!
//! `Auth`, `Validation` and `NotFound` are user errors: the boundary turns
//! them into a message. `Storage` is a system fault. `Service` only ever comes
//! from the advice endpoint and never affects the ledger.

use thiserror::Error;

use crate::policy::DenyReason;
use crate::store::StoreError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Why a caller is not allowed to proceed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("not signed in")]
    NotAuthenticated,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session expired - please sign in again")]
    SessionExpired,

    #[error("no profile found for this account")]
    ProfileMissing,

    #[error("{0}")]
    Forbidden(DenyReason),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Authorization error: {0}")]
    Auth(AuthFailure),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error("Advice service error: {0}")]
    Service(String),
}

impl LedgerError {
    pub fn forbidden(reason: DenyReason) -> Self {
        LedgerError::Auth(AuthFailure::Forbidden(reason))
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for errors caused by the caller's input or permissions.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            LedgerError::Auth(_) | LedgerError::Validation(_) | LedgerError::NotFound { .. }
        )
    }

    /// Text suitable for showing to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::Auth(AuthFailure::Forbidden(reason)) => {
                format!("You are not allowed to do that: {}", reason)
            }
            LedgerError::Auth(failure) => format!("Please sign in: {}", failure),
            LedgerError::Validation(msg) => msg.clone(),
            LedgerError::NotFound { entity, .. } => format!("The requested {} does not exist", entity),
            LedgerError::Storage(_) => {
                "The school database could not complete the request. Please try again later.".to_string()
            }
            LedgerError::Service(_) => {
                "The advice service is unavailable right now.".to_string()
            }
        }
    }
}

impl From<AuthFailure> for LedgerError {
    fn from(failure: AuthFailure) -> Self {
        LedgerError::Auth(failure)
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            StoreError::Unauthorized => LedgerError::Auth(AuthFailure::SessionExpired),
            StoreError::Forbidden(_) => LedgerError::forbidden(DenyReason::Forbidden),
            other => LedgerError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_becomes_not_found() {
        let err: LedgerError = StoreError::not_found("student", "s-1").into();
        assert!(matches!(err, LedgerError::NotFound { entity: "student", .. }));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_backend_auth_errors_become_auth_errors() {
        let err: LedgerError = StoreError::Unauthorized.into();
        assert!(matches!(err, LedgerError::Auth(AuthFailure::SessionExpired)));
        let err: LedgerError = StoreError::Forbidden("rls".to_string()).into();
        assert!(matches!(err, LedgerError::Auth(AuthFailure::Forbidden(DenyReason::Forbidden))));
    }

    #[test]
    fn test_storage_errors_are_system_faults() {
        let err: LedgerError = StoreError::Unavailable("connection refused".to_string()).into();
        assert!(!err.is_user_error());
        assert!(!err.user_message().contains("connection refused"));
    }

    #[test]
    fn test_forbidden_message() {
        let err = LedgerError::forbidden(DenyReason::NotInClassroom);
        assert!(err.is_user_error());
        assert!(err.user_message().starts_with("You are not allowed"));
    }
}

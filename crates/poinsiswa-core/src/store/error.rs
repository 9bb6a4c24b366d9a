use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Backend unreachable or overloaded. Retrying may help.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend no longer accepts the caller's token.
    #[error("backend session expired")]
    Unauthorized,

    /// Row-level access rules on the backend refused the request.
    #[error("backend denied access: {0}")]
    Forbidden(String),

    #[error("backend rejected the request: {0}")]
    Rejected(String),

    /// An idempotency key was reused for a different submission.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("could not decode backend response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

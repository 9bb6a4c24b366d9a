//! REST client module for the hosted backend.
//!
//! This module provides the `BackendClient` for the backend's three
//! surfaces: the auth endpoints (`/auth/v1`), table access through the
//! PostgREST interface (`/rest/v1/<table>`), and stored functions
//! (`/rest/v1/rpc/<name>`).
//!
//! Every request carries the project's anon key in the `apikey` header and
//! either the signed-in user's access token or the anon key as bearer.
//! Row-level access rules on the backend then apply to that user.

pub mod client;
pub mod error;
pub mod query;

pub use client::{AuthTokenResponse, AuthUser, BackendClient};
pub use error::ApiError;

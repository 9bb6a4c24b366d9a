//! HTTP client for the hosted backend.
//!
//! This module provides the `BackendClient` struct for signing in and for
//! reading and writing the ledger tables.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::query::{self, QueryParam};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for transient failures (429, 502-504, connect/timeout).
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds, doubled after each retry.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Token response from `/auth/v1/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Client for the hosted backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
    token: Option<String>,
    initial_backoff: Duration,
}

impl BackendClient {
    /// Create a new client for the project at `base_url`.
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            token: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Create a new client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        let mut client = self.clone(); // Cheap clone, shares connection pool
        client.token = Some(token);
        client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self.token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header(header::ACCEPT, "application/json")
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying transient failures with exponential backoff.
    /// `build` is called once per attempt since a `RequestBuilder` is consumed by `send`.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let result = match build().send().await {
                Ok(response) => Self::check_response(response).await,
                Err(e) => Err(ApiError::from(e)),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && retries < MAX_RETRIES => {
                    retries += 1;
                    warn!(
                        url = url,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient backend failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn parse_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    // ===== Table access =====

    /// `GET /rest/v1/<table>` with PostgREST filters.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[QueryParam],
    ) -> Result<Vec<T>, ApiError> {
        let url = self.rest_url(table);
        let response = self
            .send_with_retry(&url, || self.request(Method::GET, &url).query(params))
            .await?;
        let rows: Vec<T> = Self::parse_json(&url, response).await?;
        debug!(table = table, rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    /// First row matching `params`, if any.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[QueryParam],
    ) -> Result<Option<T>, ApiError> {
        let mut params = params.to_vec();
        params.push(query::limit(1));
        let rows: Vec<T> = self.select(table, &params).await?;
        Ok(rows.into_iter().next())
    }

    /// Exact row count via `HEAD` and the `Content-Range` header.
    pub async fn count(&self, table: &str, filters: &[QueryParam]) -> Result<u64, ApiError> {
        let url = self.rest_url(table);
        let mut params = vec![query::select("id")];
        params.extend_from_slice(filters);

        let response = self
            .send_with_retry(&url, || {
                self.request(Method::HEAD, &url)
                    .header("Prefer", "count=exact")
                    .query(&params)
            })
            .await?;

        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::InvalidResponse(format!("No Content-Range from {}", url)))?;

        query::parse_content_range(range)
            .ok_or_else(|| ApiError::InvalidResponse(format!("Unparseable Content-Range '{}'", range)))
    }

    /// `POST /rest/v1/rpc/<function>` with a JSON argument object.
    pub async fn rpc<T: DeserializeOwned, B: Serialize>(
        &self,
        function: &str,
        args: &B,
    ) -> Result<T, ApiError> {
        let url = self.rpc_url(function);
        let response = self
            .send_with_retry(&url, || self.request(Method::POST, &url).json(args))
            .await?;
        Self::parse_json(&url, response).await
    }

    // ===== Authentication =====

    /// Exchange email and password for a token pair.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthTokenResponse, ApiError> {
        let url = self.auth_url("token");
        let body = serde_json::json!({ "email": email, "password": password });
        // Not retried: a credential exchange is cheap to repeat by hand and
        // repeated failures may lock the account.
        let response = self
            .request(Method::POST, &url)
            .query(&[("grant_type", "password")])
            .json(&body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(&url, response).await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthTokenResponse, ApiError> {
        let url = self.auth_url("token");
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self
            .send_with_retry(&url, || {
                self.request(Method::POST, &url)
                    .query(&[("grant_type", "refresh_token")])
                    .json(&body)
            })
            .await?;
        Self::parse_json(&url, response).await
    }

    /// Revoke the session behind `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
        let url = self.auth_url("logout");
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = BackendClient::new("https://abc.example.co/", "anon").unwrap();
        assert_eq!(client.base_url(), "https://abc.example.co");
        assert_eq!(client.rest_url("siswa"), "https://abc.example.co/rest/v1/siswa");
        assert_eq!(
            client.rpc_url("record_point_event"),
            "https://abc.example.co/rest/v1/rpc/record_point_event"
        );
        assert_eq!(client.auth_url("logout"), "https://abc.example.co/auth/v1/logout");
    }

    #[test]
    fn test_with_token_keeps_settings() {
        let client = BackendClient::new("https://abc.example.co", "anon").unwrap();
        let authed = client.with_token("jwt".to_string());
        assert_eq!(authed.token.as_deref(), Some("jwt"));
        assert_eq!(authed.anon_key, "anon");
        assert!(client.token.is_none());
    }

    #[test]
    fn test_parse_token_response() {
        let json = r#"{
            "access_token": "eyJ...",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r-123",
            "user": {"id": "0b6f5c1e-1111-2222-3333-444455556666", "email": "guru@sekolah.sch.id", "role": "authenticated"}
        }"#;
        let parsed: AuthTokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.expires_in, 3600);
        assert_eq!(parsed.user.email.as_deref(), Some("guru@sekolah.sch.id"));
    }
}

//! # Backend API Client
//!
//! Thin HTTP client for the hosted Khata backend. Everything the agent
//! does offline stays local; this client covers the few calls that need
//! the backend at all:
//!
//! - `POST /auth/login` - exchange mobile + PIN for a bearer token
//! - `GET /profile` - the signed-in account
//! - `POST /groups/{channel}/members` - add a group chat member
//! - `DELETE /groups/{channel}/members/{id}` - remove one
//! - `GET /payments/providers` - wallet providers for counter payments
//!
//! The bearer token from `login` is held in-memory and attached to every
//! subsequent request. Non-2xx responses map onto typed errors by status
//! so callers can branch on `Unauthorized` vs `NotFound` vs `Rejected`.

use std::sync::Arc;
use std::time::Duration;

use khata_core::validation;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{AgentError, AgentResult};

// =============================================================================
// API Client
// =============================================================================

/// HTTP client for the hosted backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    /// Base URL without a trailing slash.
    base_url: String,
    /// Bearer token, set by [`ApiClient::login`].
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> AgentResult<Self> {
        let url = Url::parse(base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AgentError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Sets the bearer token for subsequent requests.
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// Clears the bearer token.
    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Returns true if a bearer token is set.
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Exchanges mobile + PIN for a bearer token and stores it.
    pub async fn login(&self, mobile: &str, pin: &str) -> AgentResult<LoginResponse> {
        let response: LoginResponse = self
            .post_json("/auth/login", &LoginRequest { mobile, pin })
            .await?;
        self.set_token(&response.token).await;
        debug!(account_id = %response.account_id, "Logged in");
        Ok(response)
    }

    /// Fetches the signed-in account profile.
    pub async fn fetch_profile(&self) -> AgentResult<Profile> {
        self.get_json("/profile").await
    }

    /// Adds a member to a group chat channel.
    pub async fn add_group_member(&self, channel: &str, member_id: &str) -> AgentResult<()> {
        validation::validate_channel(channel)?;
        let path = format!("/groups/{channel}/members");
        self.post_unit(&path, &MemberRequest { member_id }).await
    }

    /// Removes a member from a group chat channel.
    pub async fn remove_group_member(&self, channel: &str, member_id: &str) -> AgentResult<()> {
        validation::validate_channel(channel)?;
        let path = format!("/groups/{channel}/members/{member_id}");
        self.delete_unit(&path).await
    }

    /// Lists the wallet providers accepted for counter payments.
    pub async fn payment_providers(&self) -> AgentResult<Vec<PaymentProvider>> {
        self.get_json("/payments/providers").await
    }

    // =========================================================================
    // Request Plumbing
    // =========================================================================

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a non-success status onto a typed error.
    fn map_status(path: &str, status: u16, message: String) -> AgentError {
        match status {
            401 | 403 => AgentError::Unauthorized,
            404 => AgentError::NotFound {
                resource: path.to_string(),
            },
            400 | 422 => AgentError::Rejected(message),
            s => AgentError::Api { status: s, message },
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AgentResult<T> {
        let mut req = self.http.get(self.endpoint(path));
        if let Some(token) = self.token.read().await.as_deref() {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;
        Self::parse(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AgentResult<T> {
        let mut req = self.http.post(self.endpoint(path)).json(body);
        if let Some(token) = self.token.read().await.as_deref() {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;
        Self::parse(path, response).await
    }

    async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> AgentResult<()> {
        let mut req = self.http.post(self.endpoint(path)).json(body);
        if let Some(token) = self.token.read().await.as_deref() {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;
        Self::check(path, response).await
    }

    async fn delete_unit(&self, path: &str) -> AgentResult<()> {
        let mut req = self.http.delete(self.endpoint(path));
        if let Some(token) = self.token.read().await.as_deref() {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;
        Self::check(path, response).await
    }

    async fn parse<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> AgentResult<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Self::map_status(path, status.as_u16(), message))
        }
    }

    async fn check(path: &str, response: reqwest::Response) -> AgentResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Self::map_status(path, status.as_u16(), message))
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    mobile: &'a str,
    pin: &'a str,
}

/// Successful login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub account_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// The signed-in account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub mobile: String,
    #[serde(default)]
    pub shop_name: Option<String>,
}

/// One wallet provider accepted at the counter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberRequest<'a> {
    member_id: &'a str,
}

//! The headscale API collaborator and its HTTP implementation.
//!
//! [`HeadscaleApi`] is the seam the aggregation core is written against.
//! [`HttpClient`] talks to a real server over the REST gateway using an
//! API key; [`crate::fake::FakeHeadscale`] serves canned data in tests.

use std::future::Future;
use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{ApiError, Result};
use crate::types::{
    Machine, MachineList, PreAuthKey, PreAuthKeyList, Route, RouteList, User, UserList,
};

/// Default timeout for a single HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read operations the aggregation core needs from headscale.
///
/// Implementations must be shareable across tasks: the orchestrator calls
/// them concurrently from a worker pool.
pub trait HeadscaleApi: Send + Sync {
    /// List every registered machine.
    fn get_machines(&self) -> impl Future<Output = Result<Vec<Machine>>> + Send;

    /// List the routes advertised by one machine.
    fn get_machine_routes(&self, machine_id: u64)
    -> impl Future<Output = Result<Vec<Route>>> + Send;

    /// List every route known to the server.
    fn get_routes(&self) -> impl Future<Output = Result<Vec<Route>>> + Send;

    /// List every user.
    fn get_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send;

    /// List the pre-auth keys belonging to one user.
    fn get_preauth_keys(
        &self,
        user_name: &str,
    ) -> impl Future<Output = Result<Vec<PreAuthKey>>> + Send;
}

/// HTTP client for the headscale REST API.
#[derive(Clone)]
pub struct HttpClient {
    base_url: Url,
    api_key: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a client with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute `http(s)` URL or the
    /// API key is empty.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are unusable.
    pub fn with_timeout(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ApiError::config("API key cannot be empty"));
        }

        let mut base_url = Url::parse(base_url.trim())
            .map_err(|e| ApiError::config(format!("invalid server URL '{base_url}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::config(format!(
                "server URL must use http or https, got '{}'",
                base_url.scheme()
            )));
        }
        // Joining relative endpoint paths keeps any path prefix the server
        // is mounted under.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_key,
            http,
        })
    }

    /// Base URL the client sends requests to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self
            .base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| ApiError::config(format!("invalid endpoint {endpoint}: {e}")))?;

        debug!(endpoint, "Calling headscale API");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::transport(endpoint, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body.trim().to_string()
            };
            warn!(endpoint, status = status.as_u16(), "headscale API call failed");
            return Err(ApiError::status(endpoint, status.as_u16(), message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(endpoint, e.to_string()))?;
        trace!(endpoint, bytes = bytes.len(), "Received response");

        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::invalid_response(endpoint, e.to_string()))
    }
}

impl HeadscaleApi for HttpClient {
    async fn get_machines(&self) -> Result<Vec<Machine>> {
        let list: MachineList = self.get_json("/api/v1/machine", &[]).await?;
        Ok(list.machines)
    }

    async fn get_machine_routes(&self, machine_id: u64) -> Result<Vec<Route>> {
        let endpoint = format!("/api/v1/machine/{machine_id}/routes");
        let list: RouteList = self.get_json(&endpoint, &[]).await?;
        Ok(list.routes)
    }

    async fn get_routes(&self) -> Result<Vec<Route>> {
        let list: RouteList = self.get_json("/api/v1/routes", &[]).await?;
        Ok(list.routes)
    }

    async fn get_users(&self) -> Result<Vec<User>> {
        let list: UserList = self.get_json("/api/v1/user", &[]).await?;
        Ok(list.users)
    }

    async fn get_preauth_keys(&self, user_name: &str) -> Result<Vec<PreAuthKey>> {
        let list: PreAuthKeyList = self
            .get_json("/api/v1/preauthkey", &[("user", user_name)])
            .await?;
        Ok(list.pre_auth_keys)
    }
}

//! # SxT API
//!
//! HTTP client for the Space and Time gateway.
//!
//! This crate talks to the gateway's `auth/*` endpoints and provides the
//! header plumbing used by bearer- and capability-protected calls.
//!
//! ## Features
//!
//! - [`GatewayClient`]: a thin reqwest wrapper that maps gateway failures to
//!   [`ApiError::Remote`] with the server's `title`/`detail`
//! - [`ChallengeAuthenticator`]: auth code request, signing, token exchange,
//!   validation, refresh and logout
//! - [`GatewayClient::authorized_request`] for attaching `Authorization`,
//!   `Biscuit` and `originApp` headers to calls made by other components

mod auth;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use sxt_config::GatewayConfig;
use sxt_token::{CapabilityToken, TokenError};

pub use auth::{AuthChallenge, AuthStage, ChallengeAuthenticator, Identity, TokenValidity};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const BISCUIT_HEADER: &str = "Biscuit";
pub const ORIGIN_APP_HEADER: &str = "originApp";

/// Error type for the API client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Input rejected before any request was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// The gateway answered with a non-success status
    #[error("Gateway error {status}: {detail}")]
    Remote {
        status: u16,
        title: Option<String>,
        detail: String,
    },

    /// The refresh token (or session) is no longer accepted
    #[error("Session expired: {0}")]
    Expiry(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// HTTP status of a remote failure
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            ApiError::HttpClient(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// Request and response structures

/// Request payload for `auth/code`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCodeRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
}

/// Response from `auth/code`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCodeResponse {
    pub auth_code: String,
}

/// Request payload for `auth/token`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub user_id: String,
    pub auth_code: String,
    /// Hex encoded Ed25519 signature of the auth code
    pub signature: String,
    /// Base64 encoded public key
    pub key: String,
    pub scheme: String,
}

/// Access and refresh tokens issued by the gateway.
///
/// Expiries are the seconds each token remained valid for when it was issued.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BearerTokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires: i64,
    pub refresh_token_expires: i64,
}

impl std::fmt::Debug for BearerTokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenSet")
            .field("access_token_expires", &self.access_token_expires)
            .field("refresh_token_expires", &self.refresh_token_expires)
            .finish_non_exhaustive()
    }
}

/// Response from `auth/validtoken`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidTokenResponse {
    #[serde(alias = "id")]
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
}

/// Error body returned by the gateway on failure
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RemoteErrorBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// HTTP client bound to one gateway base URL
#[derive(Clone, Debug)]
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
}

impl GatewayClient {
    /// Create a new client builder
    pub fn builder() -> GatewayClientBuilder {
        GatewayClientBuilder::new()
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::builder().base_url(base_url).build()
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ApiError> {
        Self::builder().from_config(config).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint relative to the base URL
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client.request(method, self.url(endpoint))
    }

    /// Like [`request`](Self::request), with `segment` appended to the path
    /// as a single percent-encoded segment.
    pub fn request_with_segment(
        &self,
        method: Method,
        endpoint: &str,
        segment: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let mut url = reqwest::Url::parse(&self.url(endpoint))
            .map_err(|e| ApiError::validation(format!("invalid endpoint URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::validation("base URL cannot carry a path"))?
            .pop_if_empty()
            .push(segment);
        Ok(self.client.request(method, url))
    }

    /// Prepare a request carrying the gateway authorization headers.
    ///
    /// `Authorization: Bearer <access_token>` is always set. A capability
    /// token adds `Biscuit: <token>` and `origin_app` adds `originApp`.
    pub fn authorized_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        capability: Option<&CapabilityToken>,
        origin_app: Option<&str>,
    ) -> RequestBuilder {
        let mut request = self.request(method, endpoint).bearer_auth(access_token);
        if let Some(token) = capability {
            request = request.header(BISCUIT_HEADER, token.as_str());
        }
        if let Some(origin_app) = origin_app {
            request = request.header(ORIGIN_APP_HEADER, origin_app);
        }
        request
    }

    /// Send a request and decode a JSON response
    pub async fn send_request<R>(&self, request: RequestBuilder) -> Result<R, ApiError>
    where
        R: for<'de> Deserialize<'de>,
    {
        let response = self.send(request).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<T, R>(&self, endpoint: &str, request_body: &T) -> Result<R, ApiError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        self.send_request(self.request(Method::POST, endpoint).json(request_body))
            .await
    }

    /// Send a request, turning any non-success status into `ApiError::Remote`
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(ApiError::HttpClient)?;
        debug!(url = %response.url(), status = %response.status(), "gateway response");

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        Ok(response)
    }

    /// Send a request and hand back the raw response whatever its status
    pub(crate) async fn send_raw(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(ApiError::HttpClient)?;
        debug!(url = %response.url(), status = %response.status(), "gateway response");
        Ok(response)
    }
}

/// Build an `ApiError::Remote` from a failed response
pub(crate) async fn remote_error(response: Response) -> ApiError {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    remote_error_from_text(status, &error_text)
}

fn remote_error_from_text(status: StatusCode, error_text: &str) -> ApiError {
    let body: RemoteErrorBody = serde_json::from_str(error_text).unwrap_or_default();
    let detail = body.detail.unwrap_or_else(|| {
        if error_text.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            error_text.to_string()
        }
    });
    ApiError::Remote {
        status: status.as_u16(),
        title: body.title,
        detail,
    }
}

/// Builder for creating gateway clients
#[derive(Default)]
pub struct GatewayClientBuilder {
    base_url: String,
    client: Option<reqwest::Client>,
}

impl GatewayClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client builder from a GatewayConfig
    pub fn from_config(mut self, config: &GatewayConfig) -> Self {
        self.base_url = config.base_url().to_string();
        self
    }

    /// Set the base URL for the client, e.g. `https://api.spaceandtime.app/v1`
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, TLS roots)
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<GatewayClient, ApiError> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::validation("base URL is required"));
        }
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ApiError::validation(format!(
                "base URL must start with http:// or https://: {}",
                base_url
            )));
        }

        let client = match self.client {
            Some(client) => client,
            None => reqwest::Client::builder().build()?,
        };

        Ok(GatewayClient { base_url, client })
    }
}

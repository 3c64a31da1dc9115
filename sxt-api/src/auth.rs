//! Challenge-response authentication against the gateway.
//!
//! One attempt walks `Unstarted → CodeRequested → Signed → TokenIssued`:
//! the gateway hands out a single-use auth code, the client signs it with its
//! Ed25519 key, and the signature is exchanged for a bearer token set.

use std::fmt;

use reqwest::{Method, StatusCode};
use tracing::{debug, info, warn};

use sxt_config::{GatewayConfig, SignatureScheme};
use sxt_token::{decode_base64, is_hex, KeyPair, PUBLIC_KEY_LENGTH, SIGNATURE_HEX_LENGTH};

use crate::{
    remote_error, ApiError, AuthCodeRequest, AuthCodeResponse, BearerTokenSet, GatewayClient,
    TokenRequest, ValidTokenResponse,
};

/// Who is authenticating, and with which key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub join_code: Option<String>,
    pub prefix: Option<String>,
    pub scheme: SignatureScheme,
    pub keys: KeyPair,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, keys: KeyPair) -> Self {
        Self {
            user_id: user_id.into(),
            join_code: None,
            prefix: None,
            scheme: SignatureScheme::default(),
            keys,
        }
    }

    pub fn with_join_code(mut self, join_code: impl Into<String>) -> Self {
        self.join_code = Some(join_code.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Identity described by a config. A fresh keypair is generated when the
    /// config carries none.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ApiError> {
        let keys = match config.keypair() {
            Some((private_key, public_key)) => KeyPair::from_base64(private_key, public_key)?,
            None => {
                let keys = KeyPair::generate();
                info!(
                    user_id = %config.user_id,
                    public_key = %keys.public_key_base64(),
                    "no keypair configured, generated a new one"
                );
                keys
            }
        };

        Ok(Self {
            user_id: config.user_id.clone(),
            join_code: config.join_code.clone(),
            prefix: config.prefix.clone(),
            scheme: config.scheme,
            keys,
        })
    }
}

/// Progress of one authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Unstarted,
    CodeRequested,
    Signed,
    TokenIssued,
    Failed,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStage::Unstarted => "unstarted",
            AuthStage::CodeRequested => "code_requested",
            AuthStage::Signed => "signed",
            AuthStage::TokenIssued => "token_issued",
            AuthStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A single-use auth code issued for one user. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub user_id: String,
    pub join_code: Option<String>,
    pub prefix: Option<String>,
    pub auth_code: String,
}

/// Outcome of validating an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidity {
    Valid {
        user_id: String,
        session_id: Option<String>,
        subscription_id: Option<String>,
    },
    Invalid,
}

impl TokenValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenValidity::Valid { .. })
    }
}

/// Runs the gateway's challenge-response protocol and the bearer token
/// endpoints built on it.
#[derive(Debug, Clone)]
pub struct ChallengeAuthenticator {
    client: GatewayClient,
}

impl ChallengeAuthenticator {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ApiError> {
        Ok(Self::new(GatewayClient::from_config(config)?))
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    /// Ask the gateway for a one-time auth code.
    ///
    /// # Errors
    ///
    /// `Validation` when `user_id` is empty or an optional field is present
    /// but empty, `Remote` when the gateway refuses.
    pub async fn request_auth_code(
        &self,
        user_id: &str,
        prefix: Option<&str>,
        join_code: Option<&str>,
    ) -> Result<AuthChallenge, ApiError> {
        require_non_empty("user id", user_id)?;
        if let Some(prefix) = prefix {
            require_non_empty("prefix", prefix)?;
        }
        if let Some(join_code) = join_code {
            require_non_empty("join code", join_code)?;
        }

        let request = AuthCodeRequest {
            user_id: user_id.to_string(),
            prefix: prefix.map(str::to_string),
            join_code: join_code.map(str::to_string),
        };
        let response: AuthCodeResponse = self.client.post_json("auth/code", &request).await?;
        if response.auth_code.is_empty() {
            return Err(ApiError::InvalidResponse(
                "gateway returned an empty auth code".to_string(),
            ));
        }
        debug!(%user_id, "auth code issued");

        Ok(AuthChallenge {
            user_id: request.user_id,
            join_code: request.join_code,
            prefix: request.prefix,
            auth_code: response.auth_code,
        })
    }

    /// Sign an auth code with the identity key.
    ///
    /// Returns the 128 hex characters of the detached Ed25519 signature over
    /// the UTF-8 bytes of the code. The result is deterministic for a given
    /// code and key.
    pub fn sign(auth_code: &str, keys: &KeyPair) -> Result<String, ApiError> {
        require_non_empty("auth code", auth_code)?;
        let signature = keys.sign(auth_code.as_bytes());
        Ok(sxt_token::encode_hex(&signature.to_bytes()))
    }

    /// Trade a signed auth code for a bearer token set.
    pub async fn exchange_for_token(
        &self,
        user_id: &str,
        auth_code: &str,
        signature: &str,
        public_key: &str,
        scheme: SignatureScheme,
    ) -> Result<BearerTokenSet, ApiError> {
        require_non_empty("user id", user_id)?;
        require_non_empty("auth code", auth_code)?;
        if signature.len() != SIGNATURE_HEX_LENGTH || !is_hex(signature) {
            return Err(ApiError::validation(format!(
                "signature must be {} hex characters",
                SIGNATURE_HEX_LENGTH
            )));
        }
        match decode_base64(public_key) {
            Ok(bytes) if bytes.len() == PUBLIC_KEY_LENGTH => {}
            _ => {
                return Err(ApiError::validation(format!(
                    "public key must be base64 of {} bytes",
                    PUBLIC_KEY_LENGTH
                )))
            }
        }

        let request = TokenRequest {
            user_id: user_id.to_string(),
            auth_code: auth_code.to_string(),
            signature: signature.to_string(),
            key: public_key.to_string(),
            scheme: scheme.to_string(),
        };
        let tokens: BearerTokenSet = self.client.post_json("auth/token", &request).await?;
        info!(
            %user_id,
            access_expires = tokens.access_token_expires,
            refresh_expires = tokens.refresh_token_expires,
            "bearer tokens issued"
        );
        Ok(tokens)
    }

    /// Run a full attempt: request a code, sign it, exchange it.
    pub async fn authenticate(&self, identity: &Identity) -> Result<BearerTokenSet, ApiError> {
        let mut stage = AuthStage::Unstarted;
        match self.run_attempt(identity, &mut stage).await {
            Ok(tokens) => Ok(tokens),
            Err(e) => {
                warn!(
                    user_id = %identity.user_id,
                    last_stage = %stage,
                    stage = %AuthStage::Failed,
                    error = %e,
                    "authentication failed"
                );
                Err(e)
            }
        }
    }

    async fn run_attempt(
        &self,
        identity: &Identity,
        stage: &mut AuthStage,
    ) -> Result<BearerTokenSet, ApiError> {
        let challenge = self
            .request_auth_code(
                &identity.user_id,
                identity.prefix.as_deref(),
                identity.join_code.as_deref(),
            )
            .await?;
        *stage = AuthStage::CodeRequested;

        let signature = Self::sign(&challenge.auth_code, &identity.keys)?;
        *stage = AuthStage::Signed;

        let tokens = self
            .exchange_for_token(
                &challenge.user_id,
                &challenge.auth_code,
                &signature,
                &identity.keys.public_key_base64(),
                identity.scheme,
            )
            .await?;
        *stage = AuthStage::TokenIssued;
        debug!(user_id = %identity.user_id, %stage, "authentication complete");

        Ok(tokens)
    }

    /// Ask the gateway whether an access token is still valid.
    ///
    /// A 401 is a normal `Invalid` outcome, not an error.
    pub async fn validate(&self, access_token: &str) -> Result<TokenValidity, ApiError> {
        require_non_empty("access token", access_token)?;
        let request = self
            .client
            .request(Method::GET, "auth/validtoken")
            .bearer_auth(access_token);
        let response = self.client.send_raw(request).await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(TokenValidity::Invalid),
            status if status.is_success() => {
                let body: ValidTokenResponse = response.json().await.map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse response: {}", e))
                })?;
                Ok(TokenValidity::Valid {
                    user_id: body.user_id,
                    session_id: body.session_id,
                    subscription_id: body.subscription_id,
                })
            }
            _ => Err(remote_error(response).await),
        }
    }

    /// Exchange a refresh token for a new bearer token set.
    ///
    /// # Errors
    ///
    /// `Expiry` when the gateway no longer accepts the refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<BearerTokenSet, ApiError> {
        require_non_empty("refresh token", refresh_token)?;
        let request = self
            .client
            .request(Method::POST, "auth/refresh")
            .bearer_auth(refresh_token);
        let response = self.client.send_raw(request).await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::Expiry(
                "refresh token rejected by the gateway".to_string(),
            )),
            status if status.is_success() => {
                let tokens: BearerTokenSet = response.json().await.map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse response: {}", e))
                })?;
                debug!(
                    access_expires = tokens.access_token_expires,
                    "bearer tokens refreshed"
                );
                Ok(tokens)
            }
            _ => Err(remote_error(response).await),
        }
    }

    /// Invalidate the session behind a refresh token. Logging out a session
    /// the gateway already dropped (401) also succeeds.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        require_non_empty("refresh token", refresh_token)?;
        let request = self
            .client
            .request(Method::POST, "auth/logout")
            .bearer_auth(refresh_token);
        let response = self.client.send_raw(request).await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            debug!(%status, "logged out");
            Ok(())
        } else {
            Err(remote_error(response).await)
        }
    }

    /// Whether a user id is already registered with the gateway
    pub async fn user_exists(&self, user_id: &str) -> Result<bool, ApiError> {
        require_non_empty("user id", user_id)?;
        let request = self
            .client
            .request_with_segment(Method::GET, "auth/idexists", user_id)?;
        self.client.send_request(request).await
    }
}

fn require_non_empty(what: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::validation(format!("{} must not be empty", what)))
    } else {
        Ok(())
    }
}

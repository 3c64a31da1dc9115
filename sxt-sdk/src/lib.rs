//! # SxT SDK
//!
//! A Rust client library for the Space and Time gateway's identity and
//! access layer.
//!
//! This crate combines functionality from:
//! - `sxt-token`: Ed25519 keys and biscuit capability tokens
//! - `sxt-config`: Configuration management
//! - `sxt-api`: HTTP client and challenge-response authentication
//!
//! and adds session management on top:
//!
//! - **Sessions**: [`TokenLifecycleManager`] reuses, refreshes or re-acquires
//!   bearer tokens, with a 120 second low-water mark
//! - **Persistence**: pluggable [`CredentialStore`], with a four-line session
//!   file and an in-memory store
//! - **Keep-alive**: [`RefreshScheduler`], an explicit cancellable task
//! - **Capabilities**: minting and local verification of capability tokens
//!   with the identity key
//!
//! ## Example
//!
//! ```no_run
//! use sxt_sdk::{Gateway, Operation};
//!
//! # async fn run() -> Result<(), sxt_sdk::SdkError> {
//! let gateway = Gateway::builder()
//!     .base_url("https://api.spaceandtime.app/v1")
//!     .user_id("alice")
//!     .join_code("JOIN-1234")
//!     .build()?;
//!
//! let access_token = gateway.access_token().await?;
//! let capability = gateway.mint_wildcard("eth.blocks")?;
//! # let _ = (access_token, capability, Operation::Select);
//! # Ok(())
//! # }
//! ```

mod error;
mod lifecycle;
mod scheduler;
mod session;
mod store;

use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;

pub use reqwest::Method;

pub use sxt_token::{
    biscuit_public_key, combined_to_seed, decode_base64, decode_hex, encode_base64, encode_hex,
    granted_capabilities, mint, mint_batch, mint_wildcard, seed_to_combined, verify_capability,
    Biscuit, Capability, CapabilityToken, CapabilityTokenBuilder, CommandType, KeyPair, Operation,
    PublicKey, ResourceId, TokenError,
};

pub use sxt_config::{ConfigError, GatewayConfig, GatewayConfigBuilder, SignatureScheme};

pub use sxt_api::{
    ApiError, AuthChallenge, AuthStage, BearerTokenSet, ChallengeAuthenticator, GatewayClient,
    GatewayClientBuilder, Identity, TokenValidity,
};

pub use error::{ErrorKind, SdkError};
pub use lifecycle::TokenLifecycleManager;
pub use scheduler::{RefreshHandle, RefreshScheduler, DEFAULT_REFRESH_PERIOD};
pub use session::{Rotation, Session, LOW_WATER_MARK};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};

/// Unified SDK for the gateway
///
/// Owns the configuration, the identity and the lifecycle manager. Cheap to
/// share behind an `Arc`.
pub struct Gateway {
    config: GatewayConfig,
    client: GatewayClient,
    manager: Arc<TokenLifecycleManager>,
}

impl Gateway {
    /// Create a gateway that persists its session in `~/.sxt/session.txt`
    pub fn new(config: GatewayConfig) -> Result<Self, SdkError> {
        let store = FileCredentialStore::default_location()?;
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(
        config: GatewayConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, SdkError> {
        let client = GatewayClient::from_config(&config)?;
        Self::assemble(config, client, store)
    }

    fn assemble(
        config: GatewayConfig,
        client: GatewayClient,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, SdkError> {
        config.validate()?;
        let identity = Identity::from_config(&config)?;
        let authenticator = ChallengeAuthenticator::new(client.clone());
        let manager = Arc::new(TokenLifecycleManager::new(authenticator, identity, store));
        Ok(Self {
            config,
            client,
            manager,
        })
    }

    /// Create a builder for a Gateway instance
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn identity(&self) -> &Identity {
        self.manager.identity()
    }

    pub fn manager(&self) -> &Arc<TokenLifecycleManager> {
        &self.manager
    }

    /// Load the persisted session, if any
    pub async fn restore(&self) -> Result<bool, SdkError> {
        self.manager.restore().await
    }

    pub async fn tokens(&self) -> Result<BearerTokenSet, SdkError> {
        self.manager.tokens().await
    }

    /// A usable access token, rotating the session first when needed
    pub async fn access_token(&self) -> Result<String, SdkError> {
        self.manager.access_token().await
    }

    pub async fn validate(&self) -> Result<TokenValidity, SdkError> {
        self.manager.validate().await
    }

    pub async fn logout(&self) -> Result<(), SdkError> {
        self.manager.logout().await
    }

    /// Whether a user id is registered with the gateway
    pub async fn user_exists(&self, user_id: &str) -> Result<bool, SdkError> {
        Ok(self.manager.authenticator().user_exists(user_id).await?)
    }

    /// Start the keep-alive with the configured refresh interval
    pub fn start_refresh(&self) -> RefreshHandle {
        RefreshScheduler::start(self.manager.clone(), self.config.refresh_interval())
    }

    pub fn start_refresh_every(&self, period: Duration) -> RefreshHandle {
        RefreshScheduler::start(self.manager.clone(), period)
    }

    /// Prepare a request for a bearer (and optionally capability) protected
    /// endpoint, with a fresh access token attached.
    pub async fn authorized_request(
        &self,
        method: Method,
        endpoint: &str,
        capability: Option<&CapabilityToken>,
        origin_app: Option<&str>,
    ) -> Result<RequestBuilder, SdkError> {
        let access_token = self.access_token().await?;
        Ok(self
            .client
            .authorized_request(method, endpoint, &access_token, capability, origin_app))
    }

    /// Mint a capability token with the identity key
    pub fn mint(&self, capabilities: &[Capability]) -> Result<CapabilityToken, SdkError> {
        Ok(CapabilityTokenBuilder::new()
            .capabilities(capabilities.iter().cloned())
            .issue(&self.identity().keys)?)
    }

    pub fn mint_wildcard(&self, resource: &str) -> Result<CapabilityToken, SdkError> {
        Ok(mint_wildcard(resource, &self.identity().keys.seed_hex())?)
    }

    pub fn mint_batch<S: AsRef<str>>(
        &self,
        resources: &[S],
        operations: &[Operation],
    ) -> Result<Vec<CapabilityToken>, SdkError> {
        Ok(mint_batch(
            resources,
            operations,
            &self.identity().keys.seed_hex(),
        )?)
    }

    /// Check locally that a token minted with this identity grants
    /// `operation` on `resource`
    pub fn verify_capability(
        &self,
        token: &CapabilityToken,
        operation: Operation,
        resource: &str,
    ) -> Result<(), SdkError> {
        let public_key = self.identity().keys.biscuit_public_key()?;
        Ok(verify_capability(
            token.as_str(),
            public_key,
            operation,
            resource,
        )?)
    }
}

/// Builder for Gateway instances
#[derive(Default)]
pub struct GatewayBuilder {
    config_builder: GatewayConfigBuilder,
    store: Option<Arc<dyn CredentialStore>>,
    http_client: Option<reqwest::Client>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: &GatewayConfig) -> Self {
        self.config_builder = config.to_builder();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_id(user_id);
        self
    }

    pub fn join_code(mut self, join_code: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.join_code(join_code);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.prefix(prefix);
        self
    }

    pub fn scheme(mut self, scheme: SignatureScheme) -> Self {
        self.config_builder = self.config_builder.scheme(scheme);
        self
    }

    /// Use a pre-provisioned identity (base64 seed and base64 public key)
    pub fn keypair(mut self, private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.keypair(private_key, public_key);
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.config_builder = self.config_builder.refresh_interval(interval);
        self
    }

    /// Persist the session somewhere other than `~/.sxt/session.txt`
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build a Gateway instance
    pub fn build(self) -> Result<Gateway, SdkError> {
        let config = self.config_builder.build()?;

        let mut client_builder = GatewayClient::builder().from_config(&config);
        if let Some(http_client) = self.http_client {
            client_builder = client_builder.http_client(http_client);
        }
        let client = client_builder.build()?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(FileCredentialStore::default_location()?),
        };

        Gateway::assemble(config, client, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> Gateway {
        Gateway::builder()
            .base_url("http://127.0.0.1:9")
            .user_id("alice")
            .store(Arc::new(MemoryCredentialStore::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_generates_identity() {
        let gateway = gateway();
        assert_eq!(gateway.identity().user_id, "alice");
        assert_eq!(gateway.config().refresh_interval(), DEFAULT_REFRESH_PERIOD);
    }

    #[test]
    fn test_builder_uses_configured_keypair() {
        let keys = KeyPair::generate();
        let gateway = Gateway::builder()
            .base_url("http://127.0.0.1:9")
            .user_id("alice")
            .keypair(keys.seed_base64(), keys.public_key_base64())
            .store(Arc::new(MemoryCredentialStore::new()))
            .build()
            .unwrap();
        assert_eq!(gateway.identity().keys, keys);
    }

    #[test]
    fn test_builder_rejects_mismatched_keypair() {
        let keys = KeyPair::generate();
        let other = KeyPair::generate();
        let err = Gateway::builder()
            .base_url("http://127.0.0.1:9")
            .user_id("alice")
            .keypair(keys.seed_base64(), other.public_key_base64())
            .store(Arc::new(MemoryCredentialStore::new()))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Crypto);
    }

    #[test]
    fn test_mint_and_verify_with_identity_key() {
        let gateway = gateway();
        let token = gateway
            .mint(&[
                Capability::new(Operation::Insert, "eth.blocks").unwrap(),
                Capability::new(Operation::Select, "eth.blocks").unwrap(),
            ])
            .unwrap();

        assert!(gateway
            .verify_capability(&token, Operation::Insert, "eth.blocks")
            .is_ok());
        assert!(gateway
            .verify_capability(&token, Operation::Delete, "eth.blocks")
            .is_err());

        let wildcard = gateway.mint_wildcard("eth.blocks").unwrap();
        assert!(gateway
            .verify_capability(&wildcard, Operation::Delete, "eth.blocks")
            .is_ok());

        let err = gateway.mint_wildcard("3bad!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}

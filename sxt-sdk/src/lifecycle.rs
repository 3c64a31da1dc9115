//! Bearer token lifecycle: reuse, refresh or re-authenticate.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sxt_api::{ApiError, BearerTokenSet, ChallengeAuthenticator, Identity, TokenValidity};

use crate::error::SdkError;
use crate::session::{rotation_for, Rotation, Session};
use crate::store::CredentialStore;

/// Owns the current session and rotates it on demand.
///
/// The session lock is held across the rotation decision, the network call
/// and persistence, so concurrent callers trigger at most one rotation. A
/// caller that waited on the lock re-evaluates and reuses the fresh session.
pub struct TokenLifecycleManager {
    authenticator: ChallengeAuthenticator,
    identity: Identity,
    store: Arc<dyn CredentialStore>,
    session: Mutex<Option<Session>>,
}

impl TokenLifecycleManager {
    pub fn new(
        authenticator: ChallengeAuthenticator,
        identity: Identity,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            authenticator,
            identity,
            store,
            session: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn authenticator(&self) -> &ChallengeAuthenticator {
        &self.authenticator
    }

    /// Load a persisted token set. Its issuance time is taken to be now.
    ///
    /// Returns whether a session was found.
    pub async fn restore(&self) -> Result<bool, SdkError> {
        let mut session = self.session.lock().await;
        match self.store.load()? {
            Some(tokens) => {
                debug!(user_id = %self.identity.user_id, "restored persisted session");
                *session = Some(Session::new(tokens));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A token set with more than the low-water mark of access validity
    /// left, rotating the session first when needed.
    pub async fn tokens(&self) -> Result<BearerTokenSet, SdkError> {
        let mut session = self.session.lock().await;
        let rotation = rotation_for(session.as_ref(), Utc::now());
        debug!(?rotation, user_id = %self.identity.user_id, "session check");

        let tokens = match (rotation, session.as_ref()) {
            (Rotation::Reuse, Some(current)) => {
                self.store.save(&current.tokens)?;
                return Ok(current.tokens.clone());
            }
            (Rotation::Refresh, Some(current)) => {
                let refresh_token = current.refresh_token().to_string();
                self.refresh_or_reauthenticate(&refresh_token).await?
            }
            _ => self.authenticate().await?,
        };

        self.install(&mut session, tokens)
    }

    /// Current access token, rotating first when needed
    pub async fn access_token(&self) -> Result<String, SdkError> {
        Ok(self.tokens().await?.access_token)
    }

    /// Refresh regardless of remaining validity. Without a session this
    /// authenticates from scratch.
    pub async fn refresh_now(&self) -> Result<BearerTokenSet, SdkError> {
        let mut session = self.session.lock().await;
        let tokens = match session.as_ref() {
            Some(current) => {
                let refresh_token = current.refresh_token().to_string();
                self.refresh_or_reauthenticate(&refresh_token).await?
            }
            None => self.authenticate().await?,
        };
        self.install(&mut session, tokens)
    }

    /// Ask the gateway about the current access token. No session is `Invalid`.
    pub async fn validate(&self) -> Result<TokenValidity, SdkError> {
        let access_token = match self.session.lock().await.as_ref() {
            Some(current) => current.access_token().to_string(),
            None => return Ok(TokenValidity::Invalid),
        };
        Ok(self.authenticator.validate(&access_token).await?)
    }

    /// End the session on the gateway and forget it locally.
    ///
    /// The local session and the store are cleared even when the gateway
    /// call fails; that failure is still returned.
    pub async fn logout(&self) -> Result<(), SdkError> {
        let mut session = self.session.lock().await;
        let remote = match session.take() {
            Some(current) => self.authenticator.logout(current.refresh_token()).await,
            None => Ok(()),
        };
        self.store.clear()?;
        info!(user_id = %self.identity.user_id, "logged out");
        Ok(remote?)
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    async fn authenticate(&self) -> Result<BearerTokenSet, SdkError> {
        info!(user_id = %self.identity.user_id, "authenticating");
        Ok(self.authenticator.authenticate(&self.identity).await?)
    }

    async fn refresh_or_reauthenticate(
        &self,
        refresh_token: &str,
    ) -> Result<BearerTokenSet, SdkError> {
        match self.authenticator.refresh(refresh_token).await {
            Ok(tokens) => {
                info!(user_id = %self.identity.user_id, "session refreshed");
                Ok(tokens)
            }
            Err(ApiError::Expiry(reason)) => {
                warn!(%reason, "refresh token rejected, re-authenticating");
                self.authenticate().await
            }
            Err(e) => Err(e.into()),
        }
    }

    fn install(
        &self,
        session: &mut Option<Session>,
        tokens: BearerTokenSet,
    ) -> Result<BearerTokenSet, SdkError> {
        *session = Some(Session::new(tokens.clone()));
        self.store.save(&tokens)?;
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use sxt_api::GatewayClient;
    use sxt_token::KeyPair;

    fn manager(store: Arc<MemoryCredentialStore>) -> TokenLifecycleManager {
        // Never contacted by these tests.
        let client = GatewayClient::new("http://127.0.0.1:9").unwrap();
        TokenLifecycleManager::new(
            ChallengeAuthenticator::new(client),
            Identity::new("alice", KeyPair::generate()),
            store,
        )
    }

    fn long_lived() -> BearerTokenSet {
        BearerTokenSet {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            access_token_expires: 1800,
            refresh_token_expires: 7200,
        }
    }

    #[tokio::test]
    async fn test_restore_and_reuse_without_network() {
        let store = Arc::new(MemoryCredentialStore::with_tokens(long_lived()));
        let manager = manager(store.clone());

        assert!(manager.restore().await.unwrap());
        assert_eq!(manager.access_token().await.unwrap(), "access");
        assert_eq!(store.saves(), 1);
        assert_eq!(store.load().unwrap(), Some(long_lived()));
        // reuse keeps the original issuance time
        let before = manager.session().await.unwrap().issued_at;
        manager.access_token().await.unwrap();
        assert_eq!(manager.session().await.unwrap().issued_at, before);
    }

    #[tokio::test]
    async fn test_restore_empty_store() {
        let manager = manager(Arc::new(MemoryCredentialStore::new()));
        assert!(!manager.restore().await.unwrap());
        assert!(manager.session().await.is_none());
        assert_eq!(manager.validate().await.unwrap(), TokenValidity::Invalid);
    }

    #[tokio::test]
    async fn test_logout_without_session_clears_store() {
        let store = Arc::new(MemoryCredentialStore::with_tokens(long_lived()));
        let manager = manager(store.clone());

        manager.logout().await.unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}

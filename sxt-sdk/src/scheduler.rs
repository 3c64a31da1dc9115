use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::lifecycle::TokenLifecycleManager;

/// Default keep-alive period
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(25 * 60);

/// Background keep-alive that refreshes the session on a fixed period.
///
/// Nothing starts it implicitly. The caller owns the returned
/// [`RefreshHandle`] and stops the task with [`RefreshHandle::cancel`] or by
/// dropping the handle.
pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Spawn the refresh task on the current tokio runtime. The first refresh
    /// happens one `period` after start.
    pub fn start(manager: Arc<TokenLifecycleManager>, period: Duration) -> RefreshHandle {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        debug!("refresh scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match manager.refresh_now().await {
                            Ok(_) => debug!("background refresh complete"),
                            Err(e) => warn!(error = %e, kind = %e.kind(), "background refresh failed"),
                        }
                    }
                }
            }
        });

        debug!(period_secs = period.as_secs(), "refresh scheduler started");
        RefreshHandle {
            cancel: Some(cancel_tx),
            task: Some(task),
        }
    }

    pub fn start_default(manager: Arc<TokenLifecycleManager>) -> RefreshHandle {
        Self::start(manager, DEFAULT_REFRESH_PERIOD)
    }
}

/// Handle to a running [`RefreshScheduler`] task. Dropping it aborts the task.
#[derive(Debug)]
pub struct RefreshHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Stop the task and wait for it to exit. A refresh already in flight
    /// completes first.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "refresh task ended abnormally");
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use sxt_api::{ChallengeAuthenticator, GatewayClient, Identity};
    use sxt_token::KeyPair;

    fn idle_manager() -> Arc<TokenLifecycleManager> {
        let client = GatewayClient::new("http://127.0.0.1:9").unwrap();
        Arc::new(TokenLifecycleManager::new(
            ChallengeAuthenticator::new(client),
            Identity::new("alice", KeyPair::generate()),
            Arc::new(MemoryCredentialStore::new()),
        ))
    }

    #[tokio::test]
    async fn test_cancel_before_first_tick() {
        let handle = RefreshScheduler::start_default(idle_manager());
        assert!(!handle.is_finished());
        handle.cancel().await;
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let manager = idle_manager();
        let handle = RefreshScheduler::start(manager.clone(), Duration::from_secs(3600));
        drop(handle);
        // the task held the only other reference
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(Arc::strong_count(&manager), 1);
    }
}

use crate::error::ControllerError;
use api_client::PlatformApi;
use core_types::{StrategyStatus, Strategy, User};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock, watch};

/// The single shared snapshot of the signed-in account.
///
/// Every view reads from here. Server snapshots replace the local state
/// wholesale; local edits are optimistic and get overwritten by the next one.
/// Each change bumps a revision that subscribers can watch.
pub struct AccountStore {
    api: Arc<dyn PlatformApi>,
    email: String,
    state: RwLock<User>,
    revision: watch::Sender<u64>,
    invalidated: Notify,
}

impl AccountStore {
    pub fn new(api: Arc<dyn PlatformApi>, email: impl Into<String>) -> Self {
        let email = email.into();
        let (revision, _) = watch::channel(0);
        Self {
            api,
            state: RwLock::new(User {
                email: email.clone(),
                ..User::default()
            }),
            email,
            revision,
            invalidated: Notify::new(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn api(&self) -> &Arc<dyn PlatformApi> {
        &self.api
    }

    /// Fetches the account from the server and replaces the local snapshot.
    pub async fn refresh(&self) -> Result<User, ControllerError> {
        let user = self.api.fetch_user(&self.email).await?;
        tracing::debug!(
            email = %self.email,
            strategies = user.strategies.len(),
            "Account snapshot refreshed."
        );
        self.replace(user.clone()).await;
        Ok(user)
    }

    pub async fn replace(&self, user: User) {
        *self.state.write().await = user;
        self.bump();
    }

    pub async fn snapshot(&self) -> User {
        self.state.read().await.clone()
    }

    /// Applies a local edit and notifies subscribers.
    pub async fn update<R>(&self, edit: impl FnOnce(&mut User) -> R) -> R {
        let result = edit(&mut *self.state.write().await);
        self.bump();
        result
    }

    pub async fn strategy(&self, id: &str) -> Option<Strategy> {
        self.state.read().await.strategy(id).cloned()
    }

    /// Returns `false` if the strategy is not in the snapshot.
    pub async fn set_strategy_status(&self, id: &str, status: StrategyStatus) -> bool {
        self.update(|user| match user.strategy_mut(id) {
            Some(strategy) => {
                strategy.status = status;
                if status != StrategyStatus::Error {
                    strategy.last_error = None;
                }
                true
            }
            None => false,
        })
        .await
    }

    /// A receiver that changes whenever the snapshot does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Asks the poller to refresh now instead of waiting for its next tick.
    pub fn invalidate(&self) {
        tracing::debug!(email = %self.email, "Account snapshot invalidated.");
        self.invalidated.notify_one();
    }

    /// Resolves on the next `invalidate`, including one issued before the call.
    pub async fn invalidated(&self) {
        self.invalidated.notified().await;
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

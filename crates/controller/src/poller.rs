use crate::store::AccountStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Keeps an `AccountStore` fresh in a background task.
///
/// The store is refreshed on every tick of the interval (the first tick is
/// immediate) and whenever it is invalidated. The task ends when `shutdown` is
/// called or the `Poller` is dropped.
pub struct Poller {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn(store: Arc<AccountStore>, period: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            tracing::debug!(period_secs = period.as_secs(), "Account poller started.");
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {}
                    _ = store.invalidated() => {
                        // The refresh below counts as this period's tick.
                        timer.reset();
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                if let Err(e) = store.refresh().await {
                    tracing::warn!(error = %e, "Failed to refresh the account snapshot.");
                }
            }
            tracing::debug!("Account poller stopped.");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, sample_user};

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_each_tick_and_on_invalidation() {
        let api = Arc::new(FakeApi::new(sample_user()));
        let store = Arc::new(AccountStore::new(api.clone(), "trader@example.com"));
        let poller = Poller::spawn(store.clone(), Duration::from_secs(10));

        settle().await;
        assert_eq!(api.count("fetch_user"), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(api.count("fetch_user"), 2);

        store.invalidate();
        settle().await;
        assert_eq!(api.count("fetch_user"), 3);

        poller.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.count("fetch_user"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refreshes_keep_polling() {
        let api = Arc::new(FakeApi::new(sample_user()));
        api.fail("fetch_user", 500, "database unavailable");
        let store = Arc::new(AccountStore::new(api.clone(), "trader@example.com"));
        let _poller = Poller::spawn(store, Duration::from_secs(10));

        settle().await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(api.count("fetch_user"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_stops_it() {
        let api = Arc::new(FakeApi::new(sample_user()));
        let store = Arc::new(AccountStore::new(api.clone(), "trader@example.com"));
        let poller = Poller::spawn(store, Duration::from_secs(10));
        settle().await;
        drop(poller);
        settle().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(api.count("fetch_user"), 1);
    }
}

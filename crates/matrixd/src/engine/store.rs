use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use super::error::MatrixError;
use super::state::MatrixState;
use crate::client::MatrixClient;

/// Last-known authoritative matrix state.
///
/// Readers load the current `Arc` without touching the network; the poll
/// cycle is the only writer and replaces the snapshot wholesale.
pub struct MatrixStateStore {
    state: ArcSwap<MatrixState>,
    client: Arc<dyn MatrixClient>,
    /// Serializes polls so there is only ever one writer
    poll_lock: Mutex<()>,
    /// Number of polls started so far
    polls_started: AtomicU64,
}

impl MatrixStateStore {
    pub fn new(client: Arc<dyn MatrixClient>) -> Self {
        Self {
            state: ArcSwap::new(Arc::default()),
            client,
            poll_lock: Mutex::new(()),
            polls_started: AtomicU64::new(0),
        }
    }

    /// Latest snapshot. Clones the `Arc`, never blocks on I/O.
    pub fn current(&self) -> Arc<MatrixState> {
        self.state.load_full()
    }

    /// Sequence number of the most recently started poll.
    ///
    /// A published state with a larger `poll_seq` came from a poll that began
    /// after this call.
    pub fn polls_started(&self) -> u64 {
        self.polls_started.load(Ordering::SeqCst)
    }

    /// Poll the device and publish the result.
    ///
    /// On failure the previous snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<MatrixState>, MatrixError> {
        let _guard = self.poll_lock.lock().await;
        let poll_seq = self.polls_started.fetch_add(1, Ordering::SeqCst) + 1;

        let mut state = self
            .client
            .query_state()
            .await
            .map_err(MatrixError::PollFailed)?;
        state.generation = self.state.load().generation + 1;
        state.poll_seq = poll_seq;

        debug!(
            "Polled matrix: power={}, model={:?}, routing={:?} (generation {})",
            state.power, state.model_name, state.routing, state.generation
        );

        let state = Arc::new(state);
        self.state.store(state.clone());
        Ok(state)
    }

    /// Best-effort refresh; completes once a poll has been attempted.
    pub async fn request_refresh(&self) {
        if let Err(e) = self.refresh().await {
            warn!("{}; keeping last known state", e);
        }
    }

    /// Poll periodically in a background task
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; callers poll at startup themselves
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.request_refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::client::mock::MockMatrixClient;

    fn powered_on() -> MatrixState {
        MatrixState {
            power: true,
            model_name: "HDP-MXB44".to_string(),
            routing: BTreeMap::from([(1, 2)]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_current_before_first_poll() {
        let store = MatrixStateStore::new(Arc::new(MockMatrixClient::new(powered_on())));
        let state = store.current();
        assert!(!state.power);
        assert!(state.routing.is_empty());
        assert_eq!(state.generation, 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let client = Arc::new(MockMatrixClient::new(powered_on()));
        let store = MatrixStateStore::new(client.clone());

        let before = store.current();
        store.refresh().await.unwrap();
        let after = store.current();

        assert!(after.power);
        assert_eq!(after.generation, 1);
        // Old readers keep their snapshot untouched
        assert!(!before.power);

        store.refresh().await.unwrap();
        assert_eq!(store.current().generation, 2);
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_last_good_state() {
        let client = Arc::new(MockMatrixClient::new(powered_on()));
        let store = MatrixStateStore::new(client.clone());
        store.refresh().await.unwrap();

        client.fail_polls.store(true, Ordering::SeqCst);
        client.set_state(MatrixState::default());

        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, MatrixError::PollFailed(_)));

        // request_refresh swallows the failure
        store.request_refresh().await;

        let state = store.current();
        assert!(state.power);
        assert_eq!(state.generation, 1);
        assert_eq!(client.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_poller_polls_periodically() {
        let client = Arc::new(MockMatrixClient::new(powered_on()));
        let store = Arc::new(MatrixStateStore::new(client.clone()));

        let handle = store.spawn_poller(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(client.poll_count() >= 2);
        assert!(store.current().power);
    }

    #[tokio::test]
    async fn test_poller_waits_one_interval_before_first_poll() {
        let client = Arc::new(MockMatrixClient::new(powered_on()));
        let store = Arc::new(MatrixStateStore::new(client.clone()));

        let handle = store.spawn_poller(Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(client.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_poll_seq_counts_started_polls() {
        let client = Arc::new(MockMatrixClient::new(powered_on()));
        let store = MatrixStateStore::new(client.clone());
        assert_eq!(store.polls_started(), 0);

        store.refresh().await.unwrap();
        client.fail_polls.store(true, Ordering::SeqCst);
        store.request_refresh().await;
        client.fail_polls.store(false, Ordering::SeqCst);
        store.refresh().await.unwrap();

        // Failed polls still consume a sequence number
        assert_eq!(store.polls_started(), 3);
        let state = store.current();
        assert_eq!(state.poll_seq, 3);
        assert_eq!(state.generation, 2);
    }
}

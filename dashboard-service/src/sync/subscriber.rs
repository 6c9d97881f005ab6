use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use meter_client::store::{LiveStore, SnapshotStream};
use tokio::{sync::watch, task::JoinHandle};

use super::CollectionState;
use crate::normalize::Normalizer;

struct Activation {
    /// Closed by `deactivate`; publishes happen only while holding it open.
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

/// One consumer's subscription to a store path.
///
/// At most one activation exists at a time. Once [`Subscriber::deactivate`]
/// returns, the published state is never touched by that activation again.
pub struct Subscriber<N: Normalizer> {
    store: Arc<dyn LiveStore>,
    path: String,
    normalizer: Arc<N>,
    state: Arc<watch::Sender<CollectionState<N::Output>>>,
    activation: Option<Activation>,
}

impl<N: Normalizer> Subscriber<N> {
    pub fn new(store: Arc<dyn LiveStore>, path: impl Into<String>, normalizer: N) -> Self {
        let (state, _) = watch::channel(CollectionState::default());
        Self {
            store,
            path: path.into(),
            normalizer: Arc::new(normalizer),
            state: Arc::new(state),
            activation: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.activation.is_some()
    }

    pub fn watch(&self) -> watch::Receiver<CollectionState<N::Output>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> CollectionState<N::Output> {
        self.state.borrow().clone()
    }

    /// Whether the current activation ended in an error.
    pub fn has_failed(&self) -> bool {
        self.state.borrow().error.is_some()
    }

    /// Open the subscription, closing any previous one first.
    pub async fn activate(&mut self) {
        self.deactivate();

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let stream = self.store.subscribe(&self.path).await;
        let gate = Arc::new(Mutex::new(true));
        let task = tokio::spawn(run_snapshot_loop(
            stream,
            Arc::clone(&self.normalizer),
            Arc::clone(&self.state),
            Arc::clone(&gate),
            self.path.clone(),
        ));

        tracing::debug!(path = %self.path, "subscription activated");
        self.activation = Some(Activation { gate, task });
    }

    /// Close the subscription. No-op when not active.
    pub fn deactivate(&mut self) {
        let Some(activation) = self.activation.take() else {
            return;
        };

        *activation.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        activation.task.abort();
        tracing::debug!(path = %self.path, "subscription closed");
    }
}

impl<N: Normalizer> Drop for Subscriber<N> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Apply `update` unless the activation has been closed. Returns whether it ran.
fn publish<T>(gate: &Mutex<bool>, state: &watch::Sender<T>, update: impl FnOnce(&mut T)) -> bool {
    let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
    if !*open {
        return false;
    }
    state.send_modify(update);
    true
}

async fn run_snapshot_loop<N: Normalizer>(
    mut stream: SnapshotStream,
    normalizer: Arc<N>,
    state: Arc<watch::Sender<CollectionState<N::Output>>>,
    gate: Arc<Mutex<bool>>,
    path: String,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(snapshot) => {
                metrics::counter!("store_snapshots_received_total").increment(1);
                let data = normalizer.normalize(snapshot.payload.as_ref());

                let mut revision = 0;
                let open = publish(&gate, &state, |s| {
                    s.data = data;
                    s.loading = false;
                    s.revision += 1;
                    s.updated_at = Some(snapshot.received_at);
                    revision = s.revision;
                });
                if !open {
                    return;
                }
                tracing::debug!(%path, revision, "snapshot published");
            }
            Err(e) => {
                metrics::counter!("store_subscription_errors_total").increment(1);
                tracing::error!(error = %e, %path, "subscription failed; not retrying");
                publish(&gate, &state, |s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
                return;
            }
        }
    }

    metrics::counter!("store_subscription_errors_total").increment(1);
    tracing::error!(%path, "snapshot stream ended without an error; not retrying");
    publish(&gate, &state, |s| {
        s.loading = false;
        s.error = Some("snapshot stream ended".to_string());
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{DeviceNormalizer, ProfileNormalizer};
    use meter_client::store::{MemoryStore, COMPANY_PROFILE_PATH, DEVICES_PATH};
    use serde_json::json;
    use std::time::Duration;

    type DeviceState = CollectionState<Vec<meter_client::Device>>;

    async fn wait_for(
        rx: &mut watch::Receiver<DeviceState>,
        pred: impl FnMut(&DeviceState) -> bool,
    ) -> DeviceState {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed")
            .clone()
    }

    fn seeded_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_root(json!({
            "devices": {
                "A1": { "Address": "Kathmandu", "tampering": "true:" },
                "B2": { "Address": "Lalitpur" }
            }
        })))
    }

    #[tokio::test]
    async fn first_snapshot_ends_loading() {
        let store = seeded_store();
        let mut sub = Subscriber::new(store, DEVICES_PATH, DeviceNormalizer);
        assert!(sub.current().loading);

        sub.activate().await;
        let mut rx = sub.watch();
        let state = wait_for(&mut rx, |s| !s.loading).await;
        assert_eq!(state.data.len(), 2);
        assert_eq!(state.revision, 1);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn empty_collection_publishes_empty_list() {
        let store = Arc::new(MemoryStore::new());
        let mut sub = Subscriber::new(store, DEVICES_PATH, DeviceNormalizer);
        sub.activate().await;
        let mut rx = sub.watch();
        let state = wait_for(&mut rx, |s| !s.loading).await;
        assert!(state.data.is_empty());
    }

    #[tokio::test]
    async fn deleted_key_is_gone_from_next_snapshot() {
        let store = seeded_store();
        let mut sub = Subscriber::new(store.clone(), DEVICES_PATH, DeviceNormalizer);
        sub.activate().await;
        let mut rx = sub.watch();
        wait_for(&mut rx, |s| s.revision >= 1).await;

        store.write_full("devices/A1", None).await.unwrap();
        let state = wait_for(&mut rx, |s| s.revision >= 2).await;
        let ids: Vec<&str> = state.data.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["B2"]);
    }

    #[tokio::test]
    async fn subscription_error_keeps_last_data_and_records_message() {
        let store = seeded_store();
        let mut sub = Subscriber::new(store.clone(), DEVICES_PATH, DeviceNormalizer);
        sub.activate().await;
        let mut rx = sub.watch();
        wait_for(&mut rx, |s| s.revision >= 1).await;

        store.emit_error(DEVICES_PATH, "permission_denied");
        let state = wait_for(&mut rx, |s| s.error.is_some()).await;
        assert!(!state.loading);
        assert_eq!(state.data.len(), 2);
        assert!(state.error.unwrap().contains("permission_denied"));
    }

    #[tokio::test]
    async fn failed_open_publishes_error_with_empty_data() {
        let store = Arc::new(MemoryStore::new());
        store.fail_subscriptions(Some("unreachable".into()));
        let mut sub = Subscriber::new(store, DEVICES_PATH, DeviceNormalizer);
        sub.activate().await;
        let mut rx = sub.watch();
        let state = wait_for(&mut rx, |s| !s.loading).await;
        assert!(state.data.is_empty());
        assert_eq!(state.revision, 0);
        assert!(state.error.is_some());
    }

    struct EndingStore;

    #[async_trait::async_trait]
    impl LiveStore for EndingStore {
        async fn subscribe(&self, _path: &str) -> SnapshotStream {
            Box::pin(futures::stream::empty::<
                Result<meter_client::store::Snapshot, meter_client::StoreError>,
            >())
        }

        async fn write_full(
            &self,
            _path: &str,
            _value: Option<serde_json::Value>,
        ) -> Result<(), meter_client::StoreError> {
            Ok(())
        }

        fn append(&self, path: &str) -> Result<String, meter_client::StoreError> {
            Ok(format!("{path}/k"))
        }
    }

    #[tokio::test]
    async fn stream_ending_before_first_snapshot_is_an_error() {
        let mut sub = Subscriber::new(Arc::new(EndingStore), DEVICES_PATH, DeviceNormalizer);
        sub.activate().await;
        let mut rx = sub.watch();
        let state = wait_for(&mut rx, |s| !s.loading).await;
        assert_eq!(state.error.as_deref(), Some("snapshot stream ended"));
        assert_eq!(state.revision, 0);
        assert!(sub.has_failed());
    }

    #[tokio::test]
    async fn no_updates_after_deactivation() {
        let store = seeded_store();
        let mut sub = Subscriber::new(store.clone(), DEVICES_PATH, DeviceNormalizer);
        sub.activate().await;
        let mut rx = sub.watch();
        let before = wait_for(&mut rx, |s| s.revision >= 1).await;

        sub.deactivate();
        assert!(!sub.is_active());
        store
            .write_full("devices/C3", Some(json!({ "Address": "Pokhara" })))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let after = sub.current();
        assert_eq!(after.revision, before.revision);
        assert_eq!(after.data.len(), 2);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn reactivation_replaces_the_previous_subscription() {
        let store = seeded_store();
        let mut sub = Subscriber::new(store.clone(), DEVICES_PATH, DeviceNormalizer);
        sub.activate().await;
        sub.activate().await;
        let mut rx = sub.watch();
        wait_for(&mut rx, |s| !s.loading).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.listener_count(), 1);
    }

    #[tokio::test]
    async fn profile_subscription_tracks_saves() {
        let store = Arc::new(MemoryStore::new());
        let mut sub = Subscriber::new(store.clone(), COMPANY_PROFILE_PATH, ProfileNormalizer);
        sub.activate().await;
        let mut rx = sub.watch();
        let first = rx.wait_for(|s| !s.loading).await.unwrap().clone();
        assert_eq!(first.data.admin_id, "110A");

        store
            .write_full(COMPANY_PROFILE_PATH, Some(json!({ "adminId": "110A", "name": "ElectriTrack" })))
            .await
            .unwrap();
        let next = rx.wait_for(|s| s.revision >= 2).await.unwrap().clone();
        assert_eq!(next.data.name, "ElectriTrack");
    }
}

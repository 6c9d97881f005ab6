use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use meter_client::store::{segments, LiveStore};
use tokio::sync::{watch, Mutex};

use super::{CollectionState, Subscriber};
use crate::normalize::Normalizer;

/// Shared handle on one path's subscription. The subscription stays open
/// while at least one lease (or clone of it) is alive.
pub struct CollectionLease<N: Normalizer> {
    shared: Arc<Subscriber<N>>,
}

impl<N: Normalizer> Clone for CollectionLease<N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<N: Normalizer> CollectionLease<N> {
    pub fn path(&self) -> &str {
        self.shared.path()
    }

    pub fn watch(&self) -> watch::Receiver<CollectionState<N::Output>> {
        self.shared.watch()
    }

    pub fn current(&self) -> CollectionState<N::Output> {
        self.shared.current()
    }
}

/// Reference-counted subscriptions keyed by path, so every consumer of a
/// path sees the same snapshot.
pub struct SubscriptionManager<N: Normalizer> {
    store: Arc<dyn LiveStore>,
    entries: Mutex<HashMap<String, Weak<Subscriber<N>>>>,
}

impl<N: Normalizer + Default> SubscriptionManager<N> {
    pub fn new(store: Arc<dyn LiveStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Join the subscription for `path`, opening it if nobody holds it or
    /// the shared one has failed. Holders of a failed lease keep its last state.
    pub async fn acquire(&self, path: &str) -> CollectionLease<N> {
        let key = match segments(path) {
            Ok(segs) => segs.join("/"),
            Err(_) => path.to_string(),
        };

        let mut entries = self.entries.lock().await;
        entries.retain(|_, weak| weak.strong_count() > 0);

        match entries.get(&key).and_then(Weak::upgrade) {
            Some(shared) if !shared.has_failed() => {
                tracing::debug!(path = %key, "joining shared subscription");
                return CollectionLease { shared };
            }
            Some(_) => tracing::info!(path = %key, "previous subscription failed; opening a new one"),
            None => {}
        }

        let mut subscriber = Subscriber::new(Arc::clone(&self.store), path, N::default());
        subscriber.activate().await;
        let shared = Arc::new(subscriber);
        entries.insert(key, Arc::downgrade(&shared));

        CollectionLease { shared }
    }

    /// Paths with at least one live lease.
    pub async fn active_paths(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

/// A path kept subscribed for the life of its owner.
///
/// [`LiveCollection::lease`] hands out the held lease, and replaces it
/// through the manager once its subscription has failed.
pub struct LiveCollection<N: Normalizer> {
    manager: SubscriptionManager<N>,
    path: String,
    held: std::sync::Mutex<CollectionLease<N>>,
}

impl<N: Normalizer + Default> LiveCollection<N> {
    pub async fn open(store: Arc<dyn LiveStore>, path: &str) -> Self {
        let manager = SubscriptionManager::new(store);
        let held = manager.acquire(path).await;
        Self {
            manager,
            path: path.to_string(),
            held: std::sync::Mutex::new(held),
        }
    }

    fn held(&self) -> std::sync::MutexGuard<'_, CollectionLease<N>> {
        self.held.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub async fn lease(&self) -> CollectionLease<N> {
        let held = self.held().clone();
        if !held.shared.has_failed() {
            return held;
        }

        let fresh = self.manager.acquire(&self.path).await;
        *self.held() = fresh.clone();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DeviceNormalizer;
    use meter_client::store::{MemoryStore, DEVICES_PATH};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn consumers_of_one_path_share_a_subscription() {
        let store = Arc::new(MemoryStore::with_root(json!({ "devices": { "A1": {} } })));
        let manager = SubscriptionManager::<DeviceNormalizer>::new(store.clone());

        let stats = manager.acquire(DEVICES_PATH).await;
        let alerts = manager.acquire("devices").await;
        assert_eq!(store.listener_count(), 1);
        assert_eq!(manager.active_paths().await, vec!["devices".to_string()]);

        let mut rx = alerts.watch();
        rx.wait_for(|s| !s.loading).await.unwrap();
        assert_eq!(stats.current().revision, alerts.current().revision);
    }

    #[tokio::test]
    async fn last_lease_dropped_closes_the_subscription() {
        let store = Arc::new(MemoryStore::new());
        let manager = SubscriptionManager::<DeviceNormalizer>::new(store.clone());

        let a = manager.acquire(DEVICES_PATH).await;
        let b = a.clone();
        drop(a);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.listener_count(), 1);

        drop(b);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.listener_count(), 0);
        assert!(manager.active_paths().await.is_empty());
    }

    #[tokio::test]
    async fn failed_subscription_is_replaced_on_next_acquire() {
        let store = Arc::new(MemoryStore::with_root(json!({ "devices": { "A1": {} } })));
        let manager = SubscriptionManager::<DeviceNormalizer>::new(store.clone());

        let failed = manager.acquire(DEVICES_PATH).await;
        failed.watch().wait_for(|s| !s.loading).await.unwrap();
        store.emit_error(DEVICES_PATH, "stream closed");
        failed.watch().wait_for(|s| s.error.is_some()).await.unwrap();

        let fresh = manager.acquire(DEVICES_PATH).await;
        fresh.watch().wait_for(|s| !s.loading).await.unwrap();
        store
            .write_full("devices/C3", Some(json!({ "Address": "Pokhara" })))
            .await
            .unwrap();

        let state = fresh.watch().wait_for(|s| s.revision >= 2).await.unwrap().clone();
        assert!(state.error.is_none());
        assert_eq!(state.data.len(), 2);
        assert!(failed.current().error.is_some());
    }

    #[tokio::test]
    async fn live_collection_recovers_after_failure() {
        let store = Arc::new(MemoryStore::new());
        let devices = LiveCollection::<DeviceNormalizer>::open(store.clone(), DEVICES_PATH).await;

        let first = devices.lease().await;
        first.watch().wait_for(|s| !s.loading).await.unwrap();
        assert!(Arc::ptr_eq(&first.shared, &devices.lease().await.shared));

        store.emit_error(DEVICES_PATH, "auth_revoked");
        first.watch().wait_for(|s| s.error.is_some()).await.unwrap();

        let second = devices.lease().await;
        assert!(!Arc::ptr_eq(&first.shared, &second.shared));
        second.watch().wait_for(|s| !s.loading).await.unwrap();
        assert_eq!(store.listener_count(), 1);
        assert!(second.current().error.is_none());
    }

    #[tokio::test]
    async fn reacquire_after_release_opens_a_fresh_subscription() {
        let store = Arc::new(MemoryStore::new());
        let manager = SubscriptionManager::<DeviceNormalizer>::new(store.clone());

        drop(manager.acquire(DEVICES_PATH).await);
        let lease = manager.acquire(DEVICES_PATH).await;
        let mut rx = lease.watch();
        let state = rx.wait_for(|s| !s.loading).await.unwrap().clone();
        assert_eq!(state.revision, 1);
    }
}

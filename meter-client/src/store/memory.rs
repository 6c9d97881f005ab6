use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use futures::stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{
    child_path, segments, tree, Envelope, LiveStore, PushIdGenerator, Snapshot, SnapshotStream,
    StoreError,
};

struct Listener {
    segments: Vec<String>,
    tx: mpsc::UnboundedSender<Result<Snapshot, StoreError>>,
}

#[derive(Default)]
struct Inner {
    root: Value,
    listeners: Vec<Listener>,
    failing_writes: VecDeque<String>,
    failing_subscriptions: Option<String>,
}

/// In-process store backed by a single JSON tree.
///
/// Delivers the current value on subscribe and re-delivers to every listener
/// whose path overlaps a write. Includes fault injection hooks so error paths
/// can be exercised without a network.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    ids: PushIdGenerator,
}

fn overlaps(a: &[String], b: &[&str]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree (e.g. a JSON export of the database).
    pub fn with_root(root: Value) -> Self {
        let store = Self::default();
        store.lock().root = tree::prune(root).unwrap_or(Value::Null);
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value at `path`, for inspection.
    pub fn value_at(&self, path: &str) -> Option<Value> {
        let segs = segments(path).ok()?;
        tree::get_at(&self.lock().root, &segs).cloned()
    }

    /// Number of open subscriptions. Closed ones are pruned first.
    pub fn listener_count(&self) -> usize {
        let mut inner = self.lock();
        inner.listeners.retain(|l| !l.tx.is_closed());
        inner.listeners.len()
    }

    /// Make the next write fail with `message`.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.lock().failing_writes.push_back(message.into());
    }

    /// While set, new subscriptions fail immediately with `message`.
    pub fn fail_subscriptions(&self, message: Option<String>) {
        self.lock().failing_subscriptions = message;
    }

    /// Deliver a terminal error to every open subscription overlapping `path`
    /// and drop them, as a revoked permission would.
    pub fn emit_error(&self, path: &str, message: &str) {
        let Ok(segs) = segments(path) else {
            return;
        };
        let mut inner = self.lock();
        inner.listeners.retain(|l| {
            if !overlaps(&l.segments, &segs) {
                return true;
            }
            let _ = l.tx.send(Err(StoreError::Subscription(message.to_string())));
            false
        });
    }

    fn notify(inner: &mut Inner, written: &[&str]) {
        let Inner {
            root, listeners, ..
        } = inner;
        listeners.retain(|l| {
            if !overlaps(&l.segments, written) {
                return !l.tx.is_closed();
            }
            let segs: Vec<&str> = l.segments.iter().map(String::as_str).collect();
            let value = tree::get_at(root, &segs).cloned();
            l.tx.send(Ok(Envelope::now(value))).is_ok()
        });
    }
}

#[async_trait::async_trait]
impl LiveStore for MemoryStore {
    async fn subscribe(&self, path: &str) -> SnapshotStream {
        let segs = match segments(path) {
            Ok(s) => s,
            Err(e) => return Box::pin(stream::once(async move { Err::<Snapshot, _>(e) })),
        };

        let mut inner = self.lock();
        if let Some(message) = inner.failing_subscriptions.clone() {
            return Box::pin(stream::once(async move {
                Err::<Snapshot, _>(StoreError::Subscription(message))
            }));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let current = tree::get_at(&inner.root, &segs).cloned();
        // The receiver is alive here, so this cannot fail.
        let _ = tx.send(Ok(Envelope::now(current)));
        inner.listeners.push(Listener {
            segments: segs.iter().map(|s| (*s).to_string()).collect(),
            tx,
        });

        tracing::debug!(path, listeners = inner.listeners.len(), "memory store subscription opened");
        Box::pin(UnboundedReceiverStream::new(rx))
    }

    async fn write_full(&self, path: &str, value: Option<Value>) -> Result<(), StoreError> {
        let segs = segments(path)?;
        let mut inner = self.lock();

        if let Some(message) = inner.failing_writes.pop_front() {
            return Err(StoreError::Write(message));
        }

        tree::set_at(&mut inner.root, &segs, value);
        Self::notify(&mut inner, &segs);
        Ok(())
    }

    fn append(&self, path: &str) -> Result<String, StoreError> {
        segments(path)?;
        Ok(child_path(path, &self.ids.next_id()))
    }
}

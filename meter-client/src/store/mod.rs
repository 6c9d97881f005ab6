//! Capability surface of the real-time document store.
//!
//! The store is a JSON tree addressed by slash-separated paths. Consumers
//! `subscribe` to a path and receive the full value under it on every change,
//! starting with the current value. Writes replace the value at a path
//! wholesale; `None` deletes it.

pub mod memory;
pub mod push_id;
pub mod tree;

pub use memory::MemoryStore;
pub use push_id::PushIdGenerator;

use std::{pin::Pin, time::SystemTime};

use futures::Stream;
use serde_json::Value;

/// Collection of device records keyed by push id.
pub const DEVICES_PATH: &str = "devices/";
/// Singleton company profile record.
pub const COMPANY_PROFILE_PATH: &str = "companyProfile/";

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn now(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("subscription error: {0}")]
    Subscription(String),
    #[error("write error: {0}")]
    Write(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Full value at a subscribed path. `None` when nothing is stored there.
pub type Snapshot = Envelope<Option<Value>>;

/// Snapshot feed for one subscription. Dropping it closes the subscription.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Snapshot, StoreError>> + Send>>;

#[async_trait::async_trait]
pub trait LiveStore: Send + Sync {
    /// Open a standing subscription to `path`.
    ///
    /// The first item carries the current value. Errors arrive in-stream; an
    /// `Err` item ends the subscription.
    async fn subscribe(&self, path: &str) -> SnapshotStream;

    /// Replace the value at `path`. `None` removes it.
    async fn write_full(&self, path: &str, value: Option<Value>) -> Result<(), StoreError>;

    /// Allocate a fresh child key under `path` and return the child's path.
    /// Nothing is written until `write_full` is called on it.
    fn append(&self, path: &str) -> Result<String, StoreError>;
}

/// Split a store path into its non-empty segments.
///
/// Rejects the characters the real-time database forbids in keys.
pub fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(bad) = segs
        .iter()
        .find(|s| s.contains(['.', '#', '$', '[', ']']))
    {
        return Err(StoreError::InvalidPath(format!("illegal key '{bad}' in '{path}'")));
    }
    Ok(segs)
}

pub fn child_path(parent: &str, key: &str) -> String {
    format!("{}/{key}", parent.trim_end_matches('/'))
}

/// Last segment of a path, i.e. the record key.
pub fn key_of(path: &str) -> Option<&str> {
    path.split('/').filter(|s| !s.is_empty()).last()
}

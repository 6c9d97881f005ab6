//! Live collection subscriptions.
//!
//! A [`Subscriber`] keeps one standing subscription to a store path and
//! republishes every snapshot, normalized, through a `watch` channel. The
//! [`SubscriptionManager`] shares one subscriber per path between any number
//! of consumers.

pub mod manager;
pub mod subscriber;

pub use manager::{CollectionLease, LiveCollection, SubscriptionManager};
pub use subscriber::Subscriber;

use std::time::SystemTime;

/// What a consumer sees of a subscribed collection.
#[derive(Debug, Clone)]
pub struct CollectionState<T> {
    pub data: T,
    /// True until the first snapshot (or error) of the current activation.
    pub loading: bool,
    /// Displayable subscription failure. Terminal for the activation.
    pub error: Option<String>,
    /// Number of snapshots published so far.
    pub revision: u64,
    pub updated_at: Option<SystemTime>,
}

impl<T: Default> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            loading: true,
            error: None,
            revision: 0,
            updated_at: None,
        }
    }
}

pub mod api;
pub mod backends;
pub mod config;
pub mod metrics_server;
pub mod mutations;
pub mod normalize;
pub mod observability;
pub mod reducers;
pub mod sources;
pub mod sync;

pub use normalize::{DeviceNormalizer, Normalizer, ProfileNormalizer};
pub use sync::{CollectionLease, CollectionState, LiveCollection, Subscriber, SubscriptionManager};

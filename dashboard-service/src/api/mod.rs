//! JSON HTTP API over the live collections.
//!
//! Read endpoints project the current subscription state through the
//! reducers. A failed subscription is reopened on the next request. Write endpoints go through the
//! mutation write-paths and return once the store has acknowledged.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use meter_client::LiveStore;

use crate::{
    normalize::{DeviceNormalizer, ProfileNormalizer},
    sync::LiveCollection,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LiveStore>,
    pub devices: Arc<LiveCollection<DeviceNormalizer>>,
    pub profile: Arc<LiveCollection<ProfileNormalizer>>,
    pub alert_limit: usize,
    pub admin_id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/dashboard/stats", get(handlers::stats))
        .route("/api/dashboard/notifications", get(handlers::notifications))
        .route("/api/reports", get(handlers::reports))
        .route("/api/users", get(handlers::list_users).post(handlers::create_user))
        .route("/api/users/:id", put(handlers::update_user).delete(handlers::delete_user))
        .route("/api/profile", get(handlers::get_profile).put(handlers::save_profile))
        .with_state(state)
}

pub mod firebase;

pub use firebase::FirebaseRestStore;

use std::{fs, sync::Arc};

use anyhow::Context;
use meter_client::{LiveStore, MemoryStore};

use crate::config::{StoreBackend, StoreConfig};

/// Build the store selected by `[store]`.
pub fn connect(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn LiveStore>> {
    match cfg.backend {
        StoreBackend::Memory => {
            let store = match &cfg.seed_file {
                Some(path) => {
                    let contents = fs::read_to_string(path)
                        .with_context(|| format!("failed to read seed file {}", path.display()))?;
                    let root = serde_json::from_str(&contents)
                        .with_context(|| format!("seed file {} is not JSON", path.display()))?;
                    MemoryStore::with_root(root)
                }
                None => MemoryStore::new(),
            };
            tracing::info!(seeded = cfg.seed_file.is_some(), "using in-memory store");
            Ok(Arc::new(store))
        }
        StoreBackend::Firebase => {
            let url = cfg
                .database_url
                .as_deref()
                .context("store.database_url is required for the firebase backend")?;
            reqwest::Url::parse(url).with_context(|| format!("invalid store.database_url '{url}'"))?;
            let client = reqwest::Client::builder()
                .build()
                .context("failed to build HTTP client")?;
            tracing::info!(database_url = url, "using firebase store");
            Ok(Arc::new(FirebaseRestStore::new(client, url, cfg.auth_token.clone())))
        }
    }
}

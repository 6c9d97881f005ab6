use serde::Deserialize;
use std::{fs, path::PathBuf};

use crate::reducers::DEFAULT_ALERT_LIMIT;
use meter_client::domain::company_profile::DEFAULT_ADMIN_ID;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Firebase,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Realtime Database URL, e.g. `https://<project>.firebaseio.com`.
    pub database_url: Option<String>,
    /// Sent as the `auth` query parameter.
    pub auth_token: Option<String>,
    /// JSON export to start the memory backend from.
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub alert_limit: usize,
    /// Admin id stamped on every profile save.
    pub admin_id: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            alert_limit: DEFAULT_ALERT_LIMIT,
            admin_id: DEFAULT_ADMIN_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("ELECTRITRACK_CONFIG").unwrap_or_else(|_| "electritrack.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

use anyhow::{Context, Result};
use dashboard_service::{
    api::{self, AppState},
    backends,
    config::AppConfig,
    metrics_server, observability, DeviceNormalizer, LiveCollection, ProfileNormalizer,
};
use meter_client::store::{COMPANY_PROFILE_PATH, DEVICES_PATH};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = backends::connect(&cfg.store)?;

    let devices = Arc::new(LiveCollection::<DeviceNormalizer>::open(store.clone(), DEVICES_PATH).await);
    let profile = Arc::new(LiveCollection::<ProfileNormalizer>::open(store.clone(), COMPANY_PROFILE_PATH).await);

    let app = api::router(AppState {
        store,
        devices,
        profile,
        alert_limit: cfg.dashboard.alert_limit,
        admin_id: cfg.dashboard.admin_id.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&cfg.api.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.api.bind_addr))?;
    tracing::info!(addr = %cfg.api.bind_addr, "dashboard API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

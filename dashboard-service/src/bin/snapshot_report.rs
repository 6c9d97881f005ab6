use anyhow::{Context, Result};
use dashboard_service::{
    backends,
    config::AppConfig,
    observability,
    reducers::{dashboard_stats, report_rows, ReportQuery, StatusFilter},
    DeviceNormalizer, SubscriptionManager,
};
use meter_client::store::DEVICES_PATH;
use std::env;
use time::OffsetDateTime;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut args = env::args().skip(1);
    let search = args.next().unwrap_or_default();
    let status: StatusFilter = match args.next() {
        Some(label) => label.parse()?,
        None => StatusFilter::All,
    };

    let cfg = AppConfig::load()?;
    let store = backends::connect(&cfg.store)?;

    let manager = SubscriptionManager::<DeviceNormalizer>::new(store);
    let lease = manager.acquire(DEVICES_PATH).await;

    let state = {
        let mut rx = lease.watch();
        let loaded = rx
            .wait_for(|s| !s.loading)
            .await
            .context("device subscription closed before loading")?;
        loaded.clone()
    };
    if let Some(e) = &state.error {
        anyhow::bail!("device subscription failed: {e}");
    }

    let stats = dashboard_stats(&state.data);
    tracing::info!(
        total = stats.total,
        tampered = stats.tampered,
        tampered_pct = stats.tampered_pct,
        outages = stats.outages,
        outage_pct = stats.outage_pct,
        "device snapshot loaded"
    );

    let query = ReportQuery { search, status };
    let rows = report_rows(&state.data, &query, OffsetDateTime::now_utc().date());
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

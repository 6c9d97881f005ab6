use anyhow::{bail, Result};
use dashboard_service::{
    backends,
    config::{AppConfig, StoreBackend},
    mutations, observability,
    sources::DeviceCsvFileSource,
};
use futures::StreamExt;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: seed_devices <csv_file_path>");
    }
    let file_path = &args[1];

    let cfg = AppConfig::load()?;
    if cfg.store.backend == StoreBackend::Memory {
        tracing::warn!("store backend is memory; seeded records are discarded on exit");
    }
    let store = backends::connect(&cfg.store)?;

    let mut rows = DeviceCsvFileSource::new(file_path).stream();
    let (mut written, mut failed) = (0usize, 0usize);

    while let Some(item) = rows.next().await {
        let device = item?.payload;
        match mutations::insert_device(store.as_ref(), &device).await {
            Ok(id) => {
                written += 1;
                tracing::debug!(%id, "device written");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(error = %e, name = ?device.name, "device not written");
            }
        }
    }

    tracing::info!(written, failed, "seeding finished");
    if failed > 0 {
        bail!("{failed} of {} devices failed to write", written + failed);
    }
    Ok(())
}

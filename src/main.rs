use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use cot_relay::{
    ConnectivityMonitor, Database, HttpProbe, HttpTakTransport, MonitorConfig, OfflineQueue,
    Settings,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config_path = std::env::var("COT_RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("cot-relay.json"));
    let settings = Settings::load(&config_path)?;
    info!(
        "Relaying CoT to {} (queue db: {})",
        settings.tak_endpoint_url, settings.db_path
    );

    let db = Database::new(PathBuf::from(&settings.db_path))?;

    let queue = OfflineQueue::new(db.clone(), settings.max_retries);
    queue.register_transport(Arc::new(HttpTakTransport::new(
        &settings.tak_endpoint_url,
        settings.request_timeout(),
    )?));

    // Pick up anything a previous run left behind before going live.
    let report = queue.recover(settings.sync_batch_size).await?;
    if report.attempted > 0 {
        info!(
            "Startup recovery: {}/{} backlog entries delivered",
            report.succeeded, report.attempted
        );
    }

    let probe = Arc::new(HttpProbe::new(settings.probe_url(), settings.request_timeout())?);
    let mut monitor = ConnectivityMonitor::new();
    monitor.start(
        queue.clone(),
        probe,
        MonitorConfig {
            poll_interval: settings.sync_interval(),
            sync_batch_size: settings.sync_batch_size,
            retention_days: settings.retention_days,
        },
    )?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    monitor.stop().await?;

    Ok(())
}

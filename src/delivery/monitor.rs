//! Background connectivity monitor.
//!
//! Polls a reachability probe on a fixed interval and drains the offline
//! queue while the TAK server is reachable. A transition from
//! unreachable to reachable triggers an immediate sync rather than
//! waiting for the next tick.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use log::{error, info, warn};

use super::queue::OfflineQueue;

/// Retention cleanup runs once per this many seconds.
const CLEANUP_PERIOD_SECS: u64 = 3600;

/// Reachability check for the delivery target.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Considers the target online when any HTTP response comes back, even
/// an error status; only transport-level failure means unreachable.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build connectivity probe client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        self.client.get(&self.url).send().await.is_ok()
    }
}

pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub sync_batch_size: usize,
    pub retention_days: i64,
}

pub struct ConnectivityMonitor {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        queue: OfflineQueue,
        probe: Arc<dyn ConnectivityProbe>,
        config: MonitorConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("connectivity monitor already running");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(monitor_loop(queue, probe, config, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("connectivity monitor task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

async fn monitor_loop(
    queue: OfflineQueue,
    probe: Arc<dyn ConnectivityProbe>,
    config: MonitorConfig,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut was_online = false;
    let mut ticks_since_cleanup: u64 = 0;
    let cleanup_every_ticks =
        (CLEANUP_PERIOD_SECS / config.poll_interval.as_secs().max(1)).max(1);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let online = probe.is_online().await;

                if online && !was_online {
                    info!("Connectivity restored; draining offline queue");
                }

                if online {
                    match queue.sync(config.sync_batch_size).await {
                        Ok(report) if report.attempted > 0 => {
                            info!(
                                "Monitor sync: {}/{} delivered",
                                report.succeeded,
                                report.attempted
                            );
                        }
                        Ok(_) => {}
                        Err(err) => error!("Monitor sync failed: {err:?}"),
                    }
                } else if was_online {
                    warn!("TAK endpoint unreachable; queueing deliveries until it returns");
                }

                was_online = online;

                ticks_since_cleanup += 1;
                if ticks_since_cleanup >= cleanup_every_ticks {
                    ticks_since_cleanup = 0;
                    if let Err(err) = queue.cleanup(config.retention_days).await {
                        error!("Retention cleanup failed: {err:?}");
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Connectivity monitor shutting down");
                break;
            }
        }
    }
}

//! The offline queue: a durable backlog of undelivered CoT documents
//! with at-least-once delivery semantics.

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use log::{error, info, warn};

use super::transport::{CotTransport, DeliveryError};
use crate::db::{Database, QueueEntry};
use crate::models::Detection;

/// Counts from one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct QueueInner {
    db: Database,
    transports: RwLock<Vec<Arc<dyn CotTransport>>>,
    max_retries: u32,
}

/// Cheaply clonable handle; all clones share the same backlog and
/// transport registry.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<QueueInner>,
}

impl OfflineQueue {
    pub fn new(db: Database, max_retries: u32) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                db,
                transports: RwLock::new(Vec::new()),
                max_retries,
            }),
        }
    }

    /// Register a delivery mechanism. Sync tries transports in
    /// registration order until one succeeds.
    pub fn register_transport(&self, transport: Arc<dyn CotTransport>) {
        let mut guard = match self.inner.transports.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(transport);
    }

    /// Durably persist an undelivered document. Atomic: the entry is
    /// either fully recorded in `Pending` state or not at all.
    pub async fn enqueue(&self, detection: &Detection, cot_xml: &str) -> Result<i64> {
        let payload_json =
            serde_json::to_string(detection).context("failed to serialize detection payload")?;
        let id = self
            .inner
            .db
            .insert_queue_entry(&detection.id, &payload_json, cot_xml, Utc::now())
            .await
            .context("failed to enqueue CoT document")?;
        info!("Queued CoT document for detection {} (entry {id})", detection.id);
        Ok(id)
    }

    /// Try each registered transport in order until one delivers.
    pub async fn attempt_delivery(&self, cot_xml: &str) -> Result<(), DeliveryError> {
        let transports: Vec<Arc<dyn CotTransport>> = {
            let guard = match self.inner.transports.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.clone()
        };

        if transports.is_empty() {
            return Err(DeliveryError::Transport("no transports registered".into()));
        }

        let mut last_error = DeliveryError::Transport("unreachable".into());
        for transport in transports {
            match transport.deliver(cot_xml).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!("Transport {} failed: {err}", transport.name());
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }

    /// Drain up to `batch_size` of the oldest retryable entries through
    /// the registered transports.
    ///
    /// Safe to call concurrently or repeatedly: each entry is claimed
    /// (`Pending` -> `Syncing`) by exactly one pass, so an entry already
    /// `Synced` is never delivered twice.
    pub async fn sync(&self, batch_size: usize) -> Result<SyncReport> {
        let entries = self
            .inner
            .db
            .claim_pending(batch_size)
            .await
            .context("failed to claim pending queue entries")?;

        let mut report = SyncReport {
            attempted: entries.len(),
            ..SyncReport::default()
        };

        let mut entries = entries.into_iter();
        while let Some(entry) = entries.next() {
            if let Err(err) = self.resolve_claimed(&entry, &mut report).await {
                // The pass aborts here, but anything still claimed must
                // go back to the retry pool or it would be stranded as
                // `Syncing` until the next restart.
                let mut unresolved = vec![entry.id];
                unresolved.extend(entries.map(|e| e.id));
                match self.inner.db.release_claimed(unresolved).await {
                    Ok(released) => {
                        warn!("Sync pass aborted; released {released} claimed entries");
                    }
                    Err(release_err) => {
                        error!(
                            "Failed to release claimed entries after aborted sync: {release_err:?}"
                        );
                    }
                }
                return Err(err);
            }
        }

        if report.attempted > 0 {
            info!(
                "Sync pass: {} attempted, {} succeeded, {} failed",
                report.attempted, report.succeeded, report.failed
            );
        }
        Ok(report)
    }

    /// Deliver one claimed entry and record the outcome. Delivery
    /// failure is handled here (retry bump or dead-letter drop); only a
    /// persistence failure propagates.
    async fn resolve_claimed(&self, entry: &QueueEntry, report: &mut SyncReport) -> Result<()> {
        match self.attempt_delivery(&entry.cot_xml).await {
            Ok(()) => {
                self.inner.db.mark_synced(entry.id, Utc::now()).await?;
                report.succeeded += 1;
            }
            Err(err) => {
                report.failed += 1;
                let retries = entry.retry_count + 1;
                if retries > self.inner.max_retries {
                    warn!(
                        "Dead-lettering queue entry {} for detection {} after {} retries: {err}",
                        entry.id, entry.detection_id, entry.retry_count
                    );
                    self.inner.db.delete_entry(entry.id).await?;
                } else {
                    self.inner.db.release_for_retry(entry.id, retries).await?;
                }
            }
        }
        Ok(())
    }

    /// Crash recovery at process start: entries a dead process left
    /// mid-sync become retryable again, then one sync pass runs
    /// immediately.
    pub async fn recover(&self, batch_size: usize) -> Result<SyncReport> {
        let reset = self.inner.db.reset_stale_syncing().await?;
        if reset > 0 {
            warn!("Recovered {reset} queue entries left mid-sync by a previous run");
        }
        self.sync(batch_size).await
    }

    /// Undelivered backlog size, for health reporting.
    pub async fn depth(&self) -> Result<u64> {
        self.inner.db.count_unsynced().await
    }

    /// Age of the oldest undelivered entry in seconds, if any.
    pub async fn oldest_pending_age_secs(&self) -> Result<Option<i64>> {
        self.inner.db.oldest_pending_age_secs(Utc::now()).await
    }

    /// Retention cleanup: delete `Synced` entries older than
    /// `retention_days`.
    pub async fn cleanup(&self, retention_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let deleted = self.inner.db.delete_synced_before(cutoff).await?;
        if deleted > 0 {
            info!("Retention cleanup removed {deleted} synced queue entries");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::SyncStatus;
    use crate::models::CameraPose;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use uuid::Uuid;

    pub(crate) fn temp_db() -> Database {
        let path = std::env::temp_dir().join(format!("cot-relay-test-{}.sqlite3", Uuid::new_v4()));
        Database::new(path).expect("open test database")
    }

    pub(crate) fn sample_detection() -> Detection {
        Detection::new(
            "vehicle".to_string(),
            0.9,
            "drone-fleet".to_string(),
            "cam-1".to_string(),
            Utc::now(),
            960.0,
            720.0,
            CameraPose {
                latitude: 40.0,
                longitude: -74.0,
                elevation_m: 100.0,
                heading_deg: 0.0,
                pitch_deg: 0.0,
                roll_deg: 180.0,
                focal_length_px: 3000.0,
                sensor_width_mm: 13.2,
                sensor_height_mm: 8.8,
                image_width_px: 1920.0,
                image_height_px: 1440.0,
            },
        )
    }

    /// Transport whose outcome can be flipped at runtime.
    pub(crate) struct FlakyTransport {
        pub deliveries: AtomicUsize,
        pub failing: AtomicBool,
    }

    impl FlakyTransport {
        pub(crate) fn new(failing: bool) -> Arc<Self> {
            Arc::new(Self {
                deliveries: AtomicUsize::new(0),
                failing: AtomicBool::new(failing),
            })
        }
    }

    #[async_trait]
    impl CotTransport for FlakyTransport {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn deliver(&self, _cot_xml: &str) -> Result<(), DeliveryError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(DeliveryError::Timeout)
            } else {
                self.deliveries.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn sync_delivers_and_marks_synced() {
        let db = temp_db();
        let queue = OfflineQueue::new(db.clone(), 3);
        let transport = FlakyTransport::new(false);
        queue.register_transport(transport.clone());

        let detection = sample_detection();
        let entry_id = queue.enqueue(&detection, "<event/>").await.unwrap();

        let report = queue.sync(10).await.unwrap();
        assert_eq!(report, SyncReport { attempted: 1, succeeded: 1, failed: 0 });
        assert_eq!(transport.deliveries.load(Ordering::SeqCst), 1);

        let entry = db.get_queue_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncStatus::Synced);
        assert!(entry.synced_at.is_some());
    }

    #[tokio::test]
    async fn double_sync_never_double_delivers() {
        let db = temp_db();
        let queue = OfflineQueue::new(db, 3);
        let transport = FlakyTransport::new(false);
        queue.register_transport(transport.clone());

        queue.enqueue(&sample_detection(), "<event/>").await.unwrap();

        let first = queue.sync(10).await.unwrap();
        let second = queue.sync(10).await.unwrap();
        assert_eq!(first.succeeded, 1);
        assert_eq!(second.attempted, 0);
        assert_eq!(transport.deliveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_entry_returns_to_retry_pool_then_syncs() {
        let db = temp_db();
        let queue = OfflineQueue::new(db.clone(), 3);
        let transport = FlakyTransport::new(true);
        queue.register_transport(transport.clone());

        let entry_id = queue.enqueue(&sample_detection(), "<event/>").await.unwrap();

        let report = queue.sync(10).await.unwrap();
        assert_eq!(report.failed, 1);
        let entry = db.get_queue_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncStatus::FailedRetry);
        assert_eq!(entry.retry_count, 1);

        // Connectivity restored: same entry goes out exactly once.
        transport.failing.store(false, Ordering::SeqCst);
        let report = queue.sync(10).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(transport.deliveries.load(Ordering::SeqCst), 1);

        let entry = db.get_queue_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncStatus::Synced);
        assert_eq!(queue.sync(10).await.unwrap().attempted, 0);
    }

    #[tokio::test]
    async fn entry_is_dead_lettered_after_max_retries() {
        let db = temp_db();
        let queue = OfflineQueue::new(db.clone(), 2);
        queue.register_transport(FlakyTransport::new(true));

        let entry_id = queue.enqueue(&sample_detection(), "<event/>").await.unwrap();

        // Retries 1 and 2 keep the entry; the third failure drops it.
        for _ in 0..2 {
            queue.sync(10).await.unwrap();
        }
        assert!(db.get_queue_entry(entry_id).await.unwrap().is_some());

        queue.sync(10).await.unwrap();
        assert!(db.get_queue_entry(entry_id).await.unwrap().is_none());
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recover_retries_entries_from_previous_run() {
        let db = temp_db();
        let queue = OfflineQueue::new(db.clone(), 3);
        let transport = FlakyTransport::new(false);
        queue.register_transport(transport.clone());

        queue.enqueue(&sample_detection(), "<event/>").await.unwrap();
        // Simulate a crash mid-sync: entry claimed but never resolved.
        let claimed = db.claim_pending(10).await.unwrap();
        assert_eq!(claimed.len(), 1);

        let report = queue.recover(10).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(transport.deliveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aborted_sync_releases_claimed_entries() {
        let db = temp_db();
        let queue = OfflineQueue::new(db.clone(), 3);
        let transport = FlakyTransport::new(false);
        queue.register_transport(transport.clone());

        queue.enqueue(&sample_detection(), "<event/>").await.unwrap();
        queue.enqueue(&sample_detection(), "<event/>").await.unwrap();

        // Make the Synced transition fail at the store level.
        db.execute(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER block_synced BEFORE UPDATE ON queue_entries
                 WHEN NEW.status = 'Synced'
                 BEGIN SELECT RAISE(ABORT, 'disk error'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

        assert!(queue.sync(10).await.is_err());

        // Neither entry may be stranded in Syncing: both must be
        // claimable again once the store recovers.
        db.execute(|conn| {
            conn.execute_batch("DROP TRIGGER block_synced;")?;
            Ok(())
        })
        .await
        .unwrap();
        let reclaimed = db.claim_pending(10).await.unwrap();
        assert_eq!(reclaimed.len(), 2);
        assert!(reclaimed.iter().all(|e| e.status == SyncStatus::Syncing));
    }

    #[tokio::test]
    async fn second_transport_covers_first_transport_failure() {
        let db = temp_db();
        let queue = OfflineQueue::new(db, 3);
        let broken = FlakyTransport::new(true);
        let healthy = FlakyTransport::new(false);
        queue.register_transport(broken.clone());
        queue.register_transport(healthy.clone());

        queue.enqueue(&sample_detection(), "<event/>").await.unwrap();
        let report = queue.sync(10).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(healthy.deliveries.load(Ordering::SeqCst), 1);
    }
}

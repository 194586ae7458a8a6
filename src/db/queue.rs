//! Repository methods for detection records and the delivery queue.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::helpers::{parse_datetime, parse_optional_datetime, parse_status, to_u32};
use super::models::{QueueEntry, SyncStatus};
use super::Database;
use crate::models::{Detection, GeolocationResult};

fn row_to_entry(row: &Row) -> Result<QueueEntry> {
    let created_at: String = row.get("created_at")?;
    let synced_at: Option<String> = row.get("synced_at")?;
    let status: String = row.get("status")?;
    let retry_count: i64 = row.get("retry_count")?;

    Ok(QueueEntry {
        id: row.get("id")?,
        detection_id: row.get("detection_id")?,
        payload_json: row.get("payload_json")?,
        cot_xml: row.get("cot_xml")?,
        status: parse_status(&status)?,
        retry_count: to_u32(retry_count, "retry_count")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        synced_at: parse_optional_datetime(synced_at, "synced_at")?,
    })
}

impl Database {
    /// Persist a detection together with its computed geolocation.
    /// Failure here is fatal to the originating request.
    pub async fn insert_detection(
        &self,
        detection: &Detection,
        geo: &GeolocationResult,
    ) -> Result<()> {
        let record = detection.clone();
        let geo = geo.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO detections
                 (id, class_label, ai_confidence, source, camera_id, captured_at,
                  pixel_x, pixel_y, latitude, longitude, confidence, confidence_flag,
                  uncertainty_m, method, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    record.id,
                    record.class_label,
                    record.ai_confidence,
                    record.source,
                    record.camera_id,
                    record.captured_at.to_rfc3339(),
                    record.pixel_x,
                    record.pixel_y,
                    geo.latitude,
                    geo.longitude,
                    geo.confidence,
                    geo.flag.as_str(),
                    geo.uncertainty_m,
                    geo.method,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Atomically persist a new queue entry in `Pending` state.
    pub async fn insert_queue_entry(
        &self,
        detection_id: &str,
        payload_json: &str,
        cot_xml: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let detection_id = detection_id.to_string();
        let payload_json = payload_json.to_string();
        let cot_xml = cot_xml.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO queue_entries (detection_id, payload_json, cot_xml, status, retry_count, created_at)
                 VALUES (?1, ?2, ?3, 'Pending', 0, ?4)",
                params![detection_id, payload_json, cot_xml, created_at.to_rfc3339()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Claim up to `batch` of the oldest retryable entries, flipping them
    /// `Pending`/`FailedRetry` -> `Syncing` in one transaction. An entry
    /// is claimed by at most one sync pass; concurrent passes cannot
    /// double-deliver.
    pub async fn claim_pending(&self, batch: usize) -> Result<Vec<QueueEntry>> {
        let batch = batch as i64;
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let ids: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM queue_entries
                     WHERE status IN ('Pending', 'FailedRetry')
                     ORDER BY created_at ASC, id ASC
                     LIMIT ?1",
                )?;
                let mut rows = stmt.query(params![batch])?;
                let mut ids = Vec::new();
                while let Some(row) = rows.next()? {
                    ids.push(row.get(0)?);
                }
                ids
            };

            let mut claimed = Vec::with_capacity(ids.len());
            for id in ids {
                tx.execute(
                    "UPDATE queue_entries SET status = 'Syncing' WHERE id = ?1",
                    params![id],
                )?;
                let entry = tx.query_row(
                    "SELECT id, detection_id, payload_json, cot_xml, status, retry_count, created_at, synced_at
                     FROM queue_entries WHERE id = ?1",
                    params![id],
                    |row| Ok(row_to_entry(row)),
                )??;
                claimed.push(entry);
            }

            tx.commit()?;
            Ok(claimed)
        })
        .await
    }

    pub async fn mark_synced(&self, entry_id: i64, synced_at: DateTime<Utc>) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE queue_entries
                 SET status = 'Synced', synced_at = ?1
                 WHERE id = ?2",
                params![synced_at.to_rfc3339(), entry_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Return a failed entry to the retry pool with its bumped counter.
    pub async fn release_for_retry(&self, entry_id: i64, retry_count: u32) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE queue_entries
                 SET status = ?1, retry_count = ?2
                 WHERE id = ?3",
                params![SyncStatus::FailedRetry.as_str(), retry_count, entry_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Return still-claimed entries to `Pending` after an aborted sync
    /// pass. Rows no longer `Syncing` are left alone.
    pub async fn release_claimed(&self, entry_ids: Vec<i64>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut released = 0;
            for id in entry_ids {
                released += tx.execute(
                    "UPDATE queue_entries SET status = 'Pending'
                     WHERE id = ?1 AND status = 'Syncing'",
                    params![id],
                )?;
            }
            tx.commit()?;
            Ok(released)
        })
        .await
    }

    /// Dead-letter drop.
    pub async fn delete_entry(&self, entry_id: i64) -> Result<()> {
        self.execute(move |conn| {
            conn.execute("DELETE FROM queue_entries WHERE id = ?1", params![entry_id])?;
            Ok(())
        })
        .await
    }

    /// Crash recovery: entries left `Syncing` by a dead process go back
    /// to `Pending` so the next sync pass picks them up.
    pub async fn reset_stale_syncing(&self) -> Result<usize> {
        self.execute(|conn| {
            let changed = conn.execute(
                "UPDATE queue_entries SET status = 'Pending' WHERE status = 'Syncing'",
                [],
            )?;
            Ok(changed)
        })
        .await
    }

    /// Undelivered backlog size, for health reporting.
    pub async fn count_unsynced(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM queue_entries
                 WHERE status IN ('Pending', 'Syncing', 'FailedRetry')",
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    /// Age in seconds of the oldest undelivered entry, if any.
    pub async fn oldest_pending_age_secs(&self, now: DateTime<Utc>) -> Result<Option<i64>> {
        self.execute(move |conn| {
            let oldest: Option<String> = conn
                .query_row(
                    "SELECT created_at FROM queue_entries
                     WHERE status IN ('Pending', 'Syncing', 'FailedRetry')
                     ORDER BY created_at ASC, id ASC
                     LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            match oldest {
                Some(raw) => {
                    let created = parse_datetime(&raw, "created_at")?;
                    Ok(Some((now - created).num_seconds()))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// Retention cleanup: drop `Synced` entries older than the cutoff.
    pub async fn delete_synced_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM queue_entries
                 WHERE status = 'Synced' AND synced_at IS NOT NULL AND synced_at < ?1",
                params![cutoff.to_rfc3339()],
            )?;
            Ok(deleted)
        })
        .await
    }

    #[cfg(test)]
    pub async fn get_queue_entry(&self, entry_id: i64) -> Result<Option<QueueEntry>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, detection_id, payload_json, cot_xml, status, retry_count, created_at, synced_at
                 FROM queue_entries WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![entry_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_entry(row)?)),
                None => Ok(None),
            }
        })
        .await
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery lifecycle of a queued CoT document.
///
/// `Pending` -> `Syncing` -> `Synced`, or back to `Pending`/`FailedRetry`
/// with an incremented retry counter. Entries past the retry limit are
/// dead-lettered (deleted after a warning).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    FailedRetry,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "Pending",
            SyncStatus::Syncing => "Syncing",
            SyncStatus::Synced => "Synced",
            SyncStatus::FailedRetry => "FailedRetry",
        }
    }
}

/// One undelivered (or recently delivered) CoT document with its
/// originating detection metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: i64,
    pub detection_id: String,
    pub payload_json: String,
    pub cot_xml: String,
    pub status: SyncStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

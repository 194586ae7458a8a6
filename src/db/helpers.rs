use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use super::models::SyncStatus;

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<SyncStatus> {
    match value {
        "Pending" => Ok(SyncStatus::Pending),
        "Syncing" => Ok(SyncStatus::Syncing),
        "Synced" => Ok(SyncStatus::Synced),
        "FailedRetry" => Ok(SyncStatus::FailedRetry),
        other => Err(anyhow!("unknown sync status {other}")),
    }
}

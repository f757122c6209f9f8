//! Startup sweep of leftover temporary-capture keys.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::KeyValueStore;

pub const TEMP_CAPTURE_PREFIX: &str = "tempCapture_";

pub fn retention() -> Duration {
    Duration::minutes(5)
}

/// Removes temporary-capture keys that are stale or malformed.
///
/// A record is kept only if it is an object whose numeric `timestamp`
/// (milliseconds since the epoch) is within the retention window. A key
/// that cannot be read is skipped and left for the next sweep.
pub async fn purge_stale_temp_captures(storage: &dyn KeyValueStore, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = (now - retention()).timestamp_millis() as f64;
    let mut stale = Vec::new();

    for key in storage.keys().await? {
        if !key.starts_with(TEMP_CAPTURE_PREFIX) {
            continue;
        }
        let record = match storage.get(&key).await {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %key, "skipping unreadable temporary capture: {}", e);
                continue;
            }
        };
        let timestamp = record
            .as_ref()
            .and_then(|record| record.get("timestamp"))
            .and_then(Value::as_f64);
        match timestamp {
            Some(ts) if ts >= cutoff => debug!(key = %key, "temporary capture still fresh"),
            _ => stale.push(key),
        }
    }

    if !stale.is_empty() {
        storage.remove(&stale).await?;
        info!(removed = stale.len(), "purged stale temporary captures");
    }
    Ok(stale.len())
}

/// Best-effort variant for startup: failures are logged, never raised.
pub async fn purge_on_startup(storage: &dyn KeyValueStore) -> usize {
    match purge_stale_temp_captures(storage, Utc::now()).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!("temporary capture cleanup failed: {}", e);
            0
        }
    }
}

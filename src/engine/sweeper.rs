//! Expiration sweeper for service registry entries.
//!
//! Services carry a `ttl` (microseconds); once `ts + ttl` has elapsed
//! the entry is removed from the registry. The sweep runs on a fixed
//! interval independent of request handling and removes by the
//! originally-read `ts`, so an entry refreshed between the read and the
//! removal keeps its newer version. One entry's removal failure is
//! logged and skipped rather than aborting the sweep.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::DocumentStore;
use crate::model::ResourceKind;

use super::commit::now_micros;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub removed: usize,
}

/// One pass over the service registry.
pub async fn sweep_once(store: &dyn DocumentStore, now: i64) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match store.list_latest(ResourceKind::Service).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("sweep skipped, could not enumerate services: {}", e);
            return report;
        }
    };

    for entry in entries {
        report.scanned += 1;
        if entry.is_tombstone() {
            continue;
        }
        let Some(ttl) = entry.document.get("ttl").and_then(Value::as_i64) else {
            continue;
        };
        if now < entry.ts.saturating_add(ttl) {
            continue;
        }
        report.expired += 1;

        // Removal is bounded by the ts read above; a heartbeat that
        // landed meanwhile survives with its newer version.
        match store
            .remove_through(ResourceKind::Service, &entry.id, entry.ts)
            .await
        {
            Ok(count) if count > 0 => {
                report.removed += 1;
                debug!(id = %entry.id, ts = entry.ts, "expired service entry removed");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(id = %entry.id, "failed to remove expired service entry: {}", e);
            }
        }
    }
    report
}

/// Spawn the recurring sweep task.
pub fn spawn_sweeper(store: Arc<dyn DocumentStore>, interval: Duration) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let report = sweep_once(store.as_ref(), now_micros()).await;
            if report.removed > 0 {
                info!(
                    "sweep removed {} expired service entries ({} scanned)",
                    report.removed, report.scanned
                );
            } else {
                debug!("sweep complete: {} entries scanned, none expired", report.scanned);
            }
        }
    });
    info!("expiration sweeper started (interval {:?})", interval);
    handle
}

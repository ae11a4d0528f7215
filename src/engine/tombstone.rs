//! Soft-delete and tombstone tracking.
//!
//! A delete never removes the version chain; it appends a version whose
//! `status` is `DELETED`, stamped with the deletion time. Repeating the
//! delete reports that timestamp instead of silently succeeding, and
//! tombstoned resources stay readable for audit while dropping out of
//! live listings.

use serde_json::{json, Value};

use crate::db::{DocumentStore, Precondition, VersionWrite};
use crate::model::{ResourceKind, STATUS_DELETED};
use crate::types::{CensusError, Result};

use super::commit::{next_ts, TransactionManager};

/// Tombstone the resource, returning the stored tombstone version.
pub async fn delete(
    store: &dyn DocumentStore,
    tx: &TransactionManager,
    kind: ResourceKind,
    id: &str,
) -> Result<Value> {
    let latest = store
        .latest(kind, id)
        .await
        .map_err(|e| CensusError::DeleteLoad(e.to_string()))?;

    let Some(latest) = latest else {
        return Err(CensusError::NotFound {
            id: id.to_string(),
            during_delete: true,
        });
    };
    if latest.is_tombstone() {
        return Err(CensusError::Gone {
            deleted_ts: latest.ts,
        });
    }

    let ts = next_ts(Some(latest.ts));
    let mut document = latest.document.clone();
    document["status"] = json!(STATUS_DELETED);
    document["ts"] = json!(ts);

    let write = VersionWrite {
        kind,
        id: id.to_string(),
        ts,
        precondition: Precondition::LatestTs(latest.ts),
        document: document.clone(),
    };
    tx.commit(std::slice::from_ref(&write))
        .await
        .map_err(|e| match e {
            CensusError::Store(cause) => CensusError::DeleteWrite(cause),
            other => other,
        })?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::MemoryStore;

    async fn seed(store: &MemoryStore, id: &str, ts: i64) {
        store
            .append(&VersionWrite {
                kind: ResourceKind::Node,
                id: id.to_string(),
                ts,
                precondition: Precondition::Absent,
                document: json!({ "id": id, "ts": ts, "status": "UNKNOWN" }),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_appends_a_tombstone() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "n1", 100).await;
        let tx = TransactionManager::new(store.clone());

        let tombstone = delete(store.as_ref(), &tx, ResourceKind::Node, "n1")
            .await
            .unwrap();
        assert_eq!(tombstone["status"], "DELETED");

        let latest = store.latest(ResourceKind::Node, "n1").await.unwrap().unwrap();
        assert!(latest.is_tombstone());
        assert!(latest.ts > 100);
        // The live version is retained underneath the tombstone.
        assert_eq!(store.remove_through(ResourceKind::Node, "n1", latest.ts).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_delete_reports_the_first_deletion_timestamp() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "n1", 100).await;
        let tx = TransactionManager::new(store.clone());

        delete(store.as_ref(), &tx, ResourceKind::Node, "n1").await.unwrap();
        let deleted_ts = store
            .latest(ResourceKind::Node, "n1")
            .await
            .unwrap()
            .unwrap()
            .ts;

        match delete(store.as_ref(), &tx, ResourceKind::Node, "n1").await {
            Err(err @ CensusError::Gone { deleted_ts: ts }) => {
                assert_eq!(ts, deleted_ts);
                assert_eq!(err.code(), 410_001);
                assert!(err.to_string().contains(&deleted_ts.to_string()));
            }
            other => panic!("expected gone, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let tx = TransactionManager::new(store.clone());
        let err = delete(store.as_ref(), &tx, ResourceKind::Node, "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.code(), 404_002);
        assert_eq!(err.status(), 404);
    }

}

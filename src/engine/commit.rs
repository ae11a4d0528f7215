//! Write transaction manager.
//!
//! Applies a batch of version appends with all-or-nothing semantics.
//! The first append that fails triggers a rollback of everything the
//! batch already wrote; the caller learns whether that rollback itself
//! held, because a failed rollback leaves the store possibly
//! inconsistent and must be surfaced as the more severe condition.

use std::sync::Arc;

use tracing::{debug, error};

use crate::db::{DocumentStore, VersionWrite, WriteError};
use crate::model::ResourceKind;
use crate::types::{CensusError, Result};

/// Current wall-clock time in microseconds since the epoch.
pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Timestamp for the next version of a resource. Strictly greater than
/// the previous version's even when the clock has not advanced.
pub fn next_ts(prev: Option<i64>) -> i64 {
    let now = now_micros();
    match prev {
        Some(prev) => now.max(prev + 1),
        None => now,
    }
}

/// How the rollback of a failed batch ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RollbackOutcome {
    RolledBack,
    RollbackFailed(String),
}

pub struct TransactionManager {
    store: Arc<dyn DocumentStore>,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Apply every write or none of them.
    ///
    /// Appends run in order; a failure rolls the already-applied prefix
    /// back by removing the exact `(id, ts)` versions it wrote. The
    /// work runs on its own task: a caller dropped mid-request (a
    /// closed connection) cannot cancel the batch between its first
    /// append and the commit-or-rollback decision.
    pub async fn commit(&self, writes: &[VersionWrite]) -> Result<()> {
        let store = Arc::clone(&self.store);
        let writes = writes.to_vec();
        tokio::spawn(async move { Self::apply(store, writes).await })
            .await
            .map_err(|e| CensusError::Store(format!("commit task failed: {e}")))?
    }

    async fn apply(store: Arc<dyn DocumentStore>, writes: Vec<VersionWrite>) -> Result<()> {
        let mut applied: Vec<(ResourceKind, String, i64)> = Vec::with_capacity(writes.len());

        for write in &writes {
            match store.append(write).await {
                Ok(()) => {
                    debug!(id = %write.id, ts = write.ts, "version appended");
                    applied.push((write.kind, write.id.clone(), write.ts));
                }
                Err(WriteError::Store(cause)) if applied.is_empty() => {
                    // Nothing partial exists yet, so this is a plain
                    // infrastructure failure, not a conflict.
                    return Err(CensusError::Store(cause));
                }
                Err(err) => {
                    let cause = err.to_string();
                    return match Self::rollback(store.as_ref(), &applied).await {
                        RollbackOutcome::RolledBack => Err(CensusError::Conflict { cause }),
                        RollbackOutcome::RollbackFailed(rollback_error) => {
                            error!(
                                cause = %cause,
                                rollback_error = %rollback_error,
                                "rollback failed, store may be inconsistent"
                            );
                            Err(CensusError::ConflictRollbackFailed {
                                cause,
                                rollback_error,
                            })
                        }
                    };
                }
            }
        }
        Ok(())
    }

    async fn rollback(
        store: &dyn DocumentStore,
        applied: &[(ResourceKind, String, i64)],
    ) -> RollbackOutcome {
        let mut failures: Vec<String> = Vec::new();
        for (kind, id, ts) in applied.iter().rev() {
            match store.remove_version(*kind, id, *ts).await {
                Ok(true) => {}
                Ok(false) => {
                    // The version we appended is gone; nothing left to
                    // undo for this entry.
                    debug!(id = %id, ts = ts, "rollback target already absent");
                }
                Err(e) => failures.push(format!("({id}, {ts}): {e}")),
            }
        }
        if failures.is_empty() {
            RollbackOutcome::RolledBack
        } else {
            RollbackOutcome::RollbackFailed(failures.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::db::{MemoryStore, Precondition, StoredDoc};

    fn write(id: &str, ts: i64) -> VersionWrite {
        VersionWrite {
            kind: ResourceKind::Node,
            id: id.to_string(),
            ts,
            precondition: Precondition::Absent,
            document: json!({ "id": id, "ts": ts, "status": "UNKNOWN" }),
        }
    }

    #[tokio::test]
    async fn commits_a_batch() {
        let store = Arc::new(MemoryStore::new());
        let tx = TransactionManager::new(store.clone());
        tx.commit(&[write("a", 1), write("b", 2)]).await.unwrap();
        assert!(store.latest(ResourceKind::Node, "a").await.unwrap().is_some());
        assert!(store.latest(ResourceKind::Node, "b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_batch_rolls_back_applied_prefix() {
        let store = Arc::new(MemoryStore::new());
        store.append(&write("b", 1)).await.unwrap();

        let tx = TransactionManager::new(store.clone());
        // "a" applies, then "b" conflicts with the existing chain.
        let err = tx.commit(&[write("a", 1), write("b", 2)]).await.unwrap_err();
        assert_eq!(err.code(), 409_001);
        assert!(store.latest(ResourceKind::Node, "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn losing_writer_observes_conflict() {
        let store = Arc::new(MemoryStore::new());
        store.append(&write("n", 10)).await.unwrap();

        let tx = TransactionManager::new(store.clone());
        let replace = |ts: i64| VersionWrite {
            kind: ResourceKind::Node,
            id: "n".to_string(),
            ts,
            precondition: Precondition::LatestTs(10),
            document: json!({ "id": "n", "ts": ts, "status": "UNKNOWN" }),
        };

        // Two writers both loaded ts=10; exactly one append wins.
        tx.commit(&[replace(20)]).await.unwrap();
        let err = tx.commit(&[replace(21)]).await.unwrap_err();
        assert_eq!(err.code(), 409_001);
        let latest = store.latest(ResourceKind::Node, "n").await.unwrap().unwrap();
        assert_eq!(latest.ts, 20);
    }

    /// Store wrapper whose rollback removals fail.
    struct BrokenRollback(MemoryStore);

    #[async_trait]
    impl DocumentStore for BrokenRollback {
        async fn latest(
            &self,
            kind: ResourceKind,
            id: &str,
        ) -> std::result::Result<Option<StoredDoc>, WriteError> {
            self.0.latest(kind, id).await
        }
        async fn list_latest(
            &self,
            kind: ResourceKind,
        ) -> std::result::Result<Vec<StoredDoc>, WriteError> {
            self.0.list_latest(kind).await
        }
        async fn exists_live(&self, id: &str) -> std::result::Result<bool, WriteError> {
            self.0.exists_live(id).await
        }
        async fn append(&self, write: &VersionWrite) -> std::result::Result<(), WriteError> {
            self.0.append(write).await
        }
        async fn remove_version(
            &self,
            _kind: ResourceKind,
            _id: &str,
            _ts: i64,
        ) -> std::result::Result<bool, WriteError> {
            Err(WriteError::Store("connection lost".into()))
        }
        async fn remove_through(
            &self,
            kind: ResourceKind,
            id: &str,
            ts: i64,
        ) -> std::result::Result<usize, WriteError> {
            self.0.remove_through(kind, id, ts).await
        }
    }

    #[tokio::test]
    async fn failed_rollback_carries_both_causes() {
        let inner = MemoryStore::new();
        inner.append(&write("b", 1)).await.unwrap();
        let store = Arc::new(BrokenRollback(inner));

        let tx = TransactionManager::new(store);
        let err = tx.commit(&[write("a", 1), write("b", 2)]).await.unwrap_err();
        assert_eq!(err.code(), 409_002);
        let text = err.to_string();
        assert!(text.contains("already has a version"), "text was: {text}");
        assert!(text.contains("connection lost"), "text was: {text}");
    }

    #[test]
    fn next_ts_strictly_increases() {
        let now = now_micros();
        assert!(next_ts(None) >= now);
        assert_eq!(next_ts(Some(i64::MAX - 1)), i64::MAX);
        let prev = now + 10_000_000;
        assert_eq!(next_ts(Some(prev)), prev + 1);
    }
}

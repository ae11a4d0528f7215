//! The store contract the engine is written against.
//!
//! Resources are append-versioned: every successful mutation appends a
//! `(id, ts)` version and the live view of a resource is its max-`ts`
//! version. Tombstoning appends a version whose `status` is `DELETED`.
//! Appends carry an explicit precondition so that read-modify-write
//! races are detected at commit time instead of silently overwriting.

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{ResourceKind, STATUS_DELETED};

/// One stored version of a resource, as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub id: String,
    pub ts: i64,
    pub status: String,
    pub document: Value,
}

impl StoredDoc {
    pub fn is_tombstone(&self) -> bool {
        self.status == STATUS_DELETED
    }
}

/// What must hold for an append to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// No version of this id may exist (create).
    Absent,
    /// The latest version of this id must carry exactly this `ts`
    /// (replace, delete). A different latest version means another
    /// writer got there first.
    LatestTs(i64),
}

/// One version append requested by the transaction manager.
#[derive(Debug, Clone)]
pub struct VersionWrite {
    pub kind: ResourceKind,
    pub id: String,
    pub ts: i64,
    pub precondition: Precondition,
    pub document: Value,
}

/// Why an append was rejected.
#[derive(Debug, Clone)]
pub enum WriteError {
    /// The precondition no longer holds, or a unique constraint fired.
    Conflict(String),
    /// Infrastructure failure (connectivity, storage fault).
    Store(String),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Conflict(msg) => write!(f, "conflict: {msg}"),
            WriteError::Store(msg) => write!(f, "store failure: {msg}"),
        }
    }
}

/// Append-versioned document storage.
///
/// `append` must check its precondition and insert atomically with
/// respect to other appends for the same id; that is the serialization
/// point for concurrent writers. The removal methods exist for rollback
/// (`remove_version`) and for the expiration sweeper (`remove_through`,
/// which leaves versions newer than the originally-read `ts` in place).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Latest version of `id`, tombstoned or live.
    async fn latest(&self, kind: ResourceKind, id: &str) -> Result<Option<StoredDoc>, WriteError>;

    /// Latest version of every id in the collection.
    async fn list_latest(&self, kind: ResourceKind) -> Result<Vec<StoredDoc>, WriteError>;

    /// Whether any collection holds a live (non-tombstoned) resource
    /// with this id. Used by link resolution.
    async fn exists_live(&self, id: &str) -> Result<bool, WriteError>;

    /// Append one version, atomically checking its precondition.
    async fn append(&self, write: &VersionWrite) -> Result<(), WriteError>;

    /// Remove exactly the `(id, ts)` version. Returns whether it was
    /// present. Used to roll back a partially applied transaction.
    async fn remove_version(
        &self,
        kind: ResourceKind,
        id: &str,
        ts: i64,
    ) -> Result<bool, WriteError>;

    /// Remove every version of `id` with `ts` up to and including the
    /// given one. A version appended after the caller read `ts`
    /// survives. Returns the number of versions removed.
    async fn remove_through(
        &self,
        kind: ResourceKind,
        id: &str,
        ts: i64,
    ) -> Result<usize, WriteError>;
}

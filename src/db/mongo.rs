//! MongoDB-backed document store.
//!
//! Each resource kind maps to a collection holding one document per
//! `(id, ts)` version. A unique compound index on `(id, ts)` backs the
//! append discipline; the precondition check narrows the race window
//! and the index catches exact duplicates.

use async_trait::async_trait;
use bson::{doc, Document};
use futures_util::StreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde_json::Value;
use tracing::{error, info};

use crate::model::{ResourceKind, STATUS_UNKNOWN};

use super::store::{DocumentStore, Precondition, StoredDoc, VersionWrite, WriteError};

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db_name: String,
}

impl MongoStore {
    /// Connect and verify with a ping, then apply version indexes to
    /// every collection.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, WriteError> {
        info!("Connecting to MongoDB at {}", uri);

        // serverSelectionTimeoutMS keeps startup from hanging on an
        // unreachable MongoDB.
        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            format!("{uri}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| WriteError::Store(format!("failed to connect to MongoDB: {e}")))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| WriteError::Store(format!("MongoDB ping failed: {e}")))?;

        info!("Connected to MongoDB database '{}'", db_name);

        let store = Self {
            client,
            db_name: db_name.to_string(),
        };
        store.apply_indexes().await?;
        Ok(store)
    }

    fn collection(&self, kind: ResourceKind) -> Collection<Document> {
        self.client
            .database(&self.db_name)
            .collection::<Document>(kind.collection())
    }

    async fn apply_indexes(&self) -> Result<(), WriteError> {
        let index = IndexModel::builder()
            .keys(doc! { "id": 1, "ts": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        for kind in ResourceKind::ALL {
            self.collection(kind)
                .create_index(index.clone())
                .await
                .map_err(|e| {
                    WriteError::Store(format!(
                        "failed to create index on '{}': {e}",
                        kind.collection()
                    ))
                })?;
        }
        Ok(())
    }

    fn to_stored(raw: Document) -> Option<StoredDoc> {
        let id = raw.get_str("id").ok()?.to_string();
        let ts = raw.get_i64("ts").ok()?;
        let status = raw
            .get_str("status")
            .unwrap_or(STATUS_UNKNOWN)
            .to_string();
        let document: Value = raw
            .get("doc")
            .cloned()
            .and_then(|b| bson::from_bson(b).ok())?;
        Some(StoredDoc {
            id,
            ts,
            status,
            document,
        })
    }

    async fn latest_raw(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<StoredDoc>, WriteError> {
        let raw = self
            .collection(kind)
            .find_one(doc! { "id": id })
            .sort(doc! { "ts": -1 })
            .await
            .map_err(|e| WriteError::Store(format!("find failed: {e}")))?;
        Ok(raw.and_then(Self::to_stored))
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn latest(&self, kind: ResourceKind, id: &str) -> Result<Option<StoredDoc>, WriteError> {
        self.latest_raw(kind, id).await
    }

    async fn list_latest(&self, kind: ResourceKind) -> Result<Vec<StoredDoc>, WriteError> {
        let mut cursor = self
            .collection(kind)
            .find(doc! {})
            .sort(doc! { "id": 1, "ts": 1 })
            .await
            .map_err(|e| WriteError::Store(format!("find failed: {e}")))?;

        // Versions arrive in ts order per id; keep the last seen.
        let mut out: Vec<StoredDoc> = Vec::new();
        while let Some(raw) = cursor.next().await {
            let raw = match raw {
                Ok(d) => d,
                Err(e) => {
                    error!("Error reading document: {}", e);
                    continue;
                }
            };
            if let Some(stored) = Self::to_stored(raw) {
                match out.last_mut() {
                    Some(last) if last.id == stored.id => *last = stored,
                    _ => out.push(stored),
                }
            }
        }
        Ok(out)
    }

    async fn exists_live(&self, id: &str) -> Result<bool, WriteError> {
        for kind in ResourceKind::ALL {
            if let Some(stored) = self.latest_raw(kind, id).await? {
                if !stored.is_tombstone() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn append(&self, write: &VersionWrite) -> Result<(), WriteError> {
        let latest = self.latest_raw(write.kind, &write.id).await?;
        match (&write.precondition, &latest) {
            (Precondition::Absent, None) => {}
            (Precondition::Absent, Some(existing)) => {
                return Err(WriteError::Conflict(format!(
                    "id '{}' already has a version at ts={}",
                    write.id, existing.ts
                )));
            }
            (Precondition::LatestTs(expected), Some(existing)) if *expected == existing.ts => {}
            (Precondition::LatestTs(expected), Some(existing)) => {
                return Err(WriteError::Conflict(format!(
                    "id '{}' moved from ts={expected} to ts={}",
                    write.id, existing.ts
                )));
            }
            (Precondition::LatestTs(expected), None) => {
                return Err(WriteError::Conflict(format!(
                    "id '{}' has no version at ts={expected}",
                    write.id
                )));
            }
        }

        let body = bson::to_bson(&write.document)
            .map_err(|e| WriteError::Store(format!("document does not serialize: {e}")))?;
        let status = write
            .document
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(STATUS_UNKNOWN);
        let version = doc! {
            "id": &write.id,
            "ts": write.ts,
            "status": status,
            "doc": body,
        };

        self.collection(write.kind)
            .insert_one(version)
            .await
            .map_err(|e| {
                let text = e.to_string();
                // The unique (id, ts) index catches concurrent appends
                // of the same version.
                if text.contains("E11000") {
                    WriteError::Conflict(format!(
                        "version ({}, {}) already exists",
                        write.id, write.ts
                    ))
                } else {
                    WriteError::Store(format!("insert failed: {text}"))
                }
            })?;
        Ok(())
    }

    async fn remove_version(
        &self,
        kind: ResourceKind,
        id: &str,
        ts: i64,
    ) -> Result<bool, WriteError> {
        let result = self
            .collection(kind)
            .delete_one(doc! { "id": id, "ts": ts })
            .await
            .map_err(|e| WriteError::Store(format!("delete failed: {e}")))?;
        Ok(result.deleted_count == 1)
    }

    async fn remove_through(
        &self,
        kind: ResourceKind,
        id: &str,
        ts: i64,
    ) -> Result<usize, WriteError> {
        let result = self
            .collection(kind)
            .delete_many(doc! { "id": id, "ts": { "$lte": ts } })
            .await
            .map_err(|e| WriteError::Store(format!("delete failed: {e}")))?;
        Ok(result.deleted_count as usize)
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running MongoDB instance; the
    // store contract is exercised against MemoryStore in db::memory and
    // tests/pipeline.rs.
}

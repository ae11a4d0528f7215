//! In-memory store for dev mode and tests.
//!
//! A single `RwLock` over the whole registry gives appends cross-key
//! atomicity: the precondition check and the insert happen under one
//! write lock, which is the serialization point concurrent writers race
//! through.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::model::{ResourceKind, STATUS_UNKNOWN};

use super::store::{DocumentStore, Precondition, StoredDoc, VersionWrite, WriteError};

/// id -> ts -> document, ordered so the last entry is the live view.
type Versions = HashMap<String, BTreeMap<i64, Value>>;

#[derive(Default)]
pub struct MemoryStore {
    registry: RwLock<HashMap<ResourceKind, Versions>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn stored(id: &str, ts: i64, document: &Value) -> StoredDoc {
        let status = document
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(STATUS_UNKNOWN)
            .to_string();
        StoredDoc {
            id: id.to_string(),
            ts,
            status,
            document: document.clone(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn latest(&self, kind: ResourceKind, id: &str) -> Result<Option<StoredDoc>, WriteError> {
        let registry = self.registry.read().await;
        Ok(registry
            .get(&kind)
            .and_then(|versions| versions.get(id))
            .and_then(|chain| chain.iter().next_back())
            .map(|(ts, doc)| Self::stored(id, *ts, doc)))
    }

    async fn list_latest(&self, kind: ResourceKind) -> Result<Vec<StoredDoc>, WriteError> {
        let registry = self.registry.read().await;
        let Some(versions) = registry.get(&kind) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<StoredDoc> = versions
            .iter()
            .filter_map(|(id, chain)| {
                chain
                    .iter()
                    .next_back()
                    .map(|(ts, doc)| Self::stored(id, *ts, doc))
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn exists_live(&self, id: &str) -> Result<bool, WriteError> {
        let registry = self.registry.read().await;
        for versions in registry.values() {
            if let Some(chain) = versions.get(id) {
                if let Some((ts, doc)) = chain.iter().next_back() {
                    if !Self::stored(id, *ts, doc).is_tombstone() {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    async fn append(&self, write: &VersionWrite) -> Result<(), WriteError> {
        let mut registry = self.registry.write().await;
        let versions = registry.entry(write.kind).or_default();
        let chain = versions.entry(write.id.clone()).or_default();

        let latest = chain.iter().next_back().map(|(ts, _)| *ts);
        match (&write.precondition, latest) {
            (Precondition::Absent, None) => {}
            (Precondition::Absent, Some(ts)) => {
                return Err(WriteError::Conflict(format!(
                    "id '{}' already has a version at ts={ts}",
                    write.id
                )));
            }
            (Precondition::LatestTs(expected), Some(ts)) if *expected == ts => {}
            (Precondition::LatestTs(expected), Some(ts)) => {
                return Err(WriteError::Conflict(format!(
                    "id '{}' moved from ts={expected} to ts={ts}",
                    write.id
                )));
            }
            (Precondition::LatestTs(expected), None) => {
                return Err(WriteError::Conflict(format!(
                    "id '{}' has no version at ts={expected}",
                    write.id
                )));
            }
        }

        if chain.contains_key(&write.ts) {
            return Err(WriteError::Conflict(format!(
                "version ({}, {}) already exists",
                write.id, write.ts
            )));
        }
        chain.insert(write.ts, write.document.clone());
        Ok(())
    }

    async fn remove_version(
        &self,
        kind: ResourceKind,
        id: &str,
        ts: i64,
    ) -> Result<bool, WriteError> {
        let mut registry = self.registry.write().await;
        let Some(versions) = registry.get_mut(&kind) else {
            return Ok(false);
        };
        let Some(chain) = versions.get_mut(id) else {
            return Ok(false);
        };
        let removed = chain.remove(&ts).is_some();
        if chain.is_empty() {
            versions.remove(id);
        }
        Ok(removed)
    }

    async fn remove_through(
        &self,
        kind: ResourceKind,
        id: &str,
        ts: i64,
    ) -> Result<usize, WriteError> {
        let mut registry = self.registry.write().await;
        let Some(versions) = registry.get_mut(&kind) else {
            return Ok(0);
        };
        let Some(chain) = versions.get_mut(id) else {
            return Ok(0);
        };
        let keep = chain.split_off(&ts.saturating_add(1));
        let removed = chain.len();
        *chain = keep;
        if chain.is_empty() {
            versions.remove(id);
        }
        Ok(removed)
    }
}

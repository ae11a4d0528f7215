//! The resource store engine.
//!
//! An inbound write passes the content gate (`negotiate`), schema
//! validation (`schema::SchemaRegistry`), identity and link resolution
//! (`identity`), and lands in the write transaction manager (`commit`).
//! Deletes go through the tombstone tracker; the expiration sweeper
//! mutates the same store from its own task.

pub mod commit;
pub mod identity;
pub mod negotiate;
pub mod sweeper;
pub mod tombstone;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::db::{DocumentStore, Precondition, StoredDoc, VersionWrite};
use crate::model::{NetworkResource, ResourceDetail, ResourceKind};
use crate::schema::{schema_uri, SchemaRegistry};
use crate::types::{CensusError, Result};

use commit::{next_ts, TransactionManager};

pub use commit::now_micros;
pub use sweeper::{spawn_sweeper, sweep_once, SweepReport};

/// A document that cleared validation, identity, and link resolution
/// and is ready to commit.
struct PreparedDoc {
    resource: NetworkResource,
    hrefs: Vec<String>,
}

pub struct Engine {
    store: Arc<dyn DocumentStore>,
    schemas: SchemaRegistry,
    tx: TransactionManager,
    base_url: String,
}

impl Engine {
    pub fn new(store: Arc<dyn DocumentStore>, schemas: SchemaRegistry, base_url: &str) -> Self {
        let tx = TransactionManager::new(Arc::clone(&store));
        Self {
            store,
            schemas,
            tx,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create one resource, or a whole batch when the payload is a JSON
    /// array. Batches are all-or-nothing. Returns the stored
    /// representations.
    pub async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Vec<Value>> {
        let docs: Vec<&Value> = match payload {
            Value::Array(items) if items.is_empty() => {
                return Err(CensusError::SchemaViolation("empty batch".into()));
            }
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut prepared = Vec::with_capacity(docs.len());
        let mut assigned: HashSet<String> = HashSet::new();
        for doc in docs {
            // An id on create is refused before anything else looks at
            // the body.
            if let Some(supplied) = doc.get("id") {
                let supplied = supplied
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| supplied.to_string());
                return Err(CensusError::IdentitySupplied(supplied));
            }
            let mut item = self.prepare(kind, doc)?;
            let id = identity::resolve_for_create(&item.resource)?;
            item.resource.self_ref = Some(identity::self_ref(&self.base_url, kind, &id));
            item.resource.id = Some(id.clone());
            assigned.insert(id);
            prepared.push(item);
        }

        let mut known = assigned;
        for item in &prepared {
            self.snapshot_targets(&item.hrefs, &mut known).await?;
        }
        for item in &prepared {
            identity::verify_resolved(&item.hrefs, &self.base_url, &known)?;
        }

        let mut writes = Vec::with_capacity(prepared.len());
        let mut stored = Vec::with_capacity(prepared.len());
        for mut item in prepared {
            let ts = next_ts(None);
            item.resource.ts = Some(ts);
            let document = item.resource.to_value();
            writes.push(VersionWrite {
                kind,
                id: item.resource.id.clone().unwrap_or_default(),
                ts,
                precondition: Precondition::Absent,
                document: document.clone(),
            });
            stored.push(document);
        }
        self.tx.commit(&writes).await?;
        Ok(stored)
    }

    /// Full replacement of an existing resource. The body id must match
    /// the URL id, the resource must be live, and the commit fails if
    /// another writer moved the resource since it was loaded.
    pub async fn replace(&self, kind: ResourceKind, url_id: &str, payload: &Value) -> Result<Value> {
        if payload.is_array() {
            return Err(CensusError::SchemaViolation(
                "replace takes a single document".into(),
            ));
        }
        let mut item = self.prepare(kind, payload)?;
        identity::resolve_for_replace(url_id, &item.resource)?;

        let latest = self.load_latest(kind, url_id).await?;
        let Some(latest) = latest else {
            return Err(CensusError::NotFound {
                id: url_id.to_string(),
                during_delete: false,
            });
        };
        if latest.is_tombstone() {
            return Err(CensusError::Gone {
                deleted_ts: latest.ts,
            });
        }

        let mut known: HashSet<String> = HashSet::from([url_id.to_string()]);
        self.snapshot_targets(&item.hrefs, &mut known).await?;
        identity::verify_resolved(&item.hrefs, &self.base_url, &known)?;

        let ts = next_ts(Some(latest.ts));
        item.resource.ts = Some(ts);
        item.resource.self_ref = Some(identity::self_ref(&self.base_url, kind, url_id));
        let document = item.resource.to_value();
        let write = VersionWrite {
            kind,
            id: url_id.to_string(),
            ts,
            precondition: Precondition::LatestTs(latest.ts),
            document: document.clone(),
        };
        self.tx.commit(std::slice::from_ref(&write)).await?;
        Ok(document)
    }

    /// Soft-delete; returns the tombstone representation.
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<Value> {
        tombstone::delete(self.store.as_ref(), &self.tx, kind, id).await
    }

    /// Latest representation of a single resource. Tombstoned resources
    /// answer with the gone condition carrying their deletion time.
    pub async fn get(&self, kind: ResourceKind, id: &str) -> Result<Value> {
        let latest = self.load_latest(kind, id).await?;
        match latest {
            None => Err(CensusError::NotFound {
                id: id.to_string(),
                during_delete: false,
            }),
            Some(doc) if doc.is_tombstone() => Err(CensusError::Gone {
                deleted_ts: doc.ts,
            }),
            Some(doc) => Ok(doc.document),
        }
    }

    /// Live resources in a collection; tombstones are excluded.
    pub async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        let entries = self
            .store
            .list_latest(kind)
            .await
            .map_err(|e| CensusError::Store(e.to_string()))?;
        Ok(entries
            .into_iter()
            .filter(|doc| !doc.is_tombstone())
            .map(|doc| doc.document)
            .collect())
    }

    /// Collection index served at the service root.
    pub fn root_document(&self) -> Value {
        let links: Vec<Value> = ResourceKind::ALL
            .iter()
            .map(|kind| {
                json!({
                    "href": format!("{}/{}", self.base_url, kind.collection()),
                    "rel": "instances",
                    "describedby": schema_uri(*kind),
                })
            })
            .collect();
        json!({ "links": links })
    }

    /// Validate against the collection schema and decode the typed
    /// record plus its kind detail.
    fn prepare(&self, kind: ResourceKind, doc: &Value) -> Result<PreparedDoc> {
        self.schemas.validate(kind, doc)?;
        let resource = NetworkResource::from_value(doc)
            .map_err(|e| CensusError::SchemaViolation(format!("document does not decode: {e}")))?;
        let detail = ResourceDetail::decode(kind, &resource)
            .map_err(|e| CensusError::SchemaViolation(format!("document does not decode: {e}")))?;
        let hrefs = identity::collect_hrefs(&resource, &detail);
        Ok(PreparedDoc { resource, hrefs })
    }

    async fn load_latest(&self, kind: ResourceKind, id: &str) -> Result<Option<StoredDoc>> {
        self.store
            .latest(kind, id)
            .await
            .map_err(|e| CensusError::Store(e.to_string()))
    }

    /// Read the store once for every same-store id the hrefs name,
    /// extending `known` with those that resolve to live resources.
    /// Resolution after this snapshot is pure.
    async fn snapshot_targets(
        &self,
        hrefs: &[String],
        known: &mut HashSet<String>,
    ) -> Result<()> {
        for target in identity::local_targets(hrefs, &self.base_url) {
            if known.contains(&target) {
                continue;
            }
            let live = self
                .store
                .exists_live(&target)
                .await
                .map_err(|e| CensusError::Store(e.to_string()))?;
            if live {
                known.insert(target);
            }
        }
        Ok(())
    }
}

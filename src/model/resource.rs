//! The shared core of every network resource document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status of a resource that nothing has reported on yet.
pub const STATUS_UNKNOWN: &str = "UNKNOWN";

/// Status marking a tombstoned version.
pub const STATUS_DELETED: &str = "DELETED";

/// Hypermedia link descriptor used by `relations`, link `endpoints`, and
/// extent parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub href: String,
    pub rel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// One validity interval of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    pub start: String,
    pub end: String,
}

/// Typed core shared by every stored document.
///
/// `id`, `selfRef`, and `ts` are optional on the inbound representation;
/// the engine guarantees all three are present before anything is
/// written. Fields outside the core (kind-specific detail, duck-typed
/// extensions) are kept in `extra` and decoded on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkResource {
    #[serde(rename = "$schema")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "selfRef", default, skip_serializing_if = "Option::is_none")]
    pub self_ref: Option<String>,

    /// Microseconds since the epoch; server-assigned, strictly
    /// increasing per resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lifetimes: Vec<Lifetime>,

    /// Free-form for most kinds; extents carry a URI string here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    /// Relation name to ordered link descriptors.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, Vec<LinkRef>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_status() -> String {
    STATUS_UNKNOWN.to_string()
}

impl NetworkResource {
    pub fn from_value(value: &Value) -> Result<NetworkResource, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("resource serializes to json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_minimal_document() {
        let value = json!({
            "$schema": "https://schemas.census.dev/20240701/node#",
            "name": "switch-12",
        });
        let res = NetworkResource::from_value(&value).unwrap();
        assert_eq!(res.status, STATUS_UNKNOWN);
        assert!(res.id.is_none());
        assert!(res.relations.is_empty());
    }

    #[test]
    fn keeps_extension_fields() {
        let value = json!({
            "$schema": "https://schemas.census.dev/20240701/port#",
            "address": { "type": "mac", "address": "0002b365b8c9" },
        });
        let res = NetworkResource::from_value(&value).unwrap();
        assert!(res.extra.contains_key("address"));
        let back = res.to_value();
        assert_eq!(back["address"]["type"], "mac");
    }

    #[test]
    fn relations_decode_as_link_refs() {
        let value = json!({
            "$schema": "https://schemas.census.dev/20240701/port#",
            "relations": {
                "over": [ { "href": "http://example.net/ports/p0", "rel": "full" } ]
            }
        });
        let res = NetworkResource::from_value(&value).unwrap();
        assert_eq!(res.relations["over"][0].href, "http://example.net/ports/p0");
    }

    #[test]
    fn rejects_wrongly_typed_relations() {
        let value = json!({
            "$schema": "https://schemas.census.dev/20240701/port#",
            "relations": { "over": [ { "rel": "full" } ] }
        });
        assert!(NetworkResource::from_value(&value).is_err());
    }
}

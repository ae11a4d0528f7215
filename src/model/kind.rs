//! Kind-specific payloads decoded from a resource's extension fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::resource::{LinkRef, NetworkResource};
use super::ResourceKind;

/// Endpoints of a link. Exactly one of the two shapes is valid for a
/// given document; the schema's `oneOf` enforces exclusivity before this
/// type ever sees the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoints {
    Undirected([LinkRef; 2]),
    Directed { source: LinkRef, sink: LinkRef },
}

impl Endpoints {
    pub fn refs(&self) -> Vec<&LinkRef> {
        match self {
            Endpoints::Undirected(pair) => pair.iter().collect(),
            Endpoints::Directed { source, sink } => vec![source, sink],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDetail {
    #[serde(default)]
    pub directed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    pub endpoints: Endpoints,
}

/// Parent of a storage extent: a link descriptor, an embedded parent
/// object, or absent ("adrift").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtentParent {
    Ref(LinkRef),
    Embedded(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtentDetail {
    pub size: u64,
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ExtentParent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    /// Time-to-live in microseconds; entries without one are never swept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(
        rename = "serviceType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_type: Option<String>,
}

/// Kind-specific view of a resource, decoded after schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDetail {
    Plain,
    Link(LinkDetail),
    Extent(ExtentDetail),
    Service(ServiceDetail),
}

impl ResourceDetail {
    /// Decode the detail variant for `kind` from the resource's
    /// extension fields.
    pub fn decode(
        kind: ResourceKind,
        resource: &NetworkResource,
    ) -> Result<ResourceDetail, serde_json::Error> {
        let extra = Value::Object(resource.extra.clone());
        Ok(match kind {
            ResourceKind::Link => ResourceDetail::Link(serde_json::from_value(extra)?),
            ResourceKind::Extent => ResourceDetail::Extent(serde_json::from_value(extra)?),
            ResourceKind::Service => ResourceDetail::Service(serde_json::from_value(extra)?),
            _ => ResourceDetail::Plain,
        })
    }

    /// Link descriptors contributed by the kind detail (on top of the
    /// core `relations` map).
    pub fn link_refs(&self) -> Vec<&LinkRef> {
        match self {
            ResourceDetail::Link(link) => link.endpoints.refs(),
            ResourceDetail::Extent(extent) => match &extent.parent {
                Some(ExtentParent::Ref(link)) => vec![link],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(extra: Value) -> NetworkResource {
        let mut value = json!({ "$schema": "https://schemas.census.dev/20240701/link#" });
        for (k, v) in extra.as_object().unwrap() {
            value[k.as_str()] = v.clone();
        }
        NetworkResource::from_value(&value).unwrap()
    }

    #[test]
    fn undirected_endpoints_decode() {
        let res = resource(json!({
            "directed": false,
            "endpoints": [
                { "href": "http://example.net/ports/a", "rel": "full" },
                { "href": "http://example.net/ports/b", "rel": "full" }
            ]
        }));
        let detail = ResourceDetail::decode(ResourceKind::Link, &res).unwrap();
        match detail {
            ResourceDetail::Link(link) => {
                assert!(!link.directed);
                assert_eq!(link.endpoints.refs().len(), 2);
            }
            other => panic!("expected link detail, got {other:?}"),
        }
    }

    #[test]
    fn directed_endpoints_decode() {
        let res = resource(json!({
            "directed": true,
            "capacity": 10e9,
            "endpoints": {
                "source": { "href": "http://example.net/ports/a", "rel": "full" },
                "sink": { "href": "http://example.net/ports/b", "rel": "full" }
            }
        }));
        match ResourceDetail::decode(ResourceKind::Link, &res).unwrap() {
            ResourceDetail::Link(link) => match link.endpoints {
                Endpoints::Directed { source, sink } => {
                    assert_eq!(source.href, "http://example.net/ports/a");
                    assert_eq!(sink.href, "http://example.net/ports/b");
                }
                other => panic!("expected directed endpoints, got {other:?}"),
            },
            other => panic!("expected link detail, got {other:?}"),
        }
    }

    #[test]
    fn extent_without_parent_is_adrift() {
        let value = json!({
            "$schema": "https://schemas.census.dev/20240701/extent#",
            "location": "ibp://depot.example.net:6714",
            "size": 1024,
            "offset": 0,
            "parent": null
        });
        let res = NetworkResource::from_value(&value).unwrap();
        match ResourceDetail::decode(ResourceKind::Extent, &res).unwrap() {
            ResourceDetail::Extent(extent) => {
                assert_eq!(extent.size, 1024);
                assert!(extent.parent.is_none());
            }
            other => panic!("expected extent detail, got {other:?}"),
        }
    }

    #[test]
    fn extent_parent_ref_is_a_link() {
        let value = json!({
            "$schema": "https://schemas.census.dev/20240701/extent#",
            "location": "ibp://depot.example.net:6714",
            "size": 4096,
            "offset": 1024,
            "parent": { "href": "http://example.net/extents/root", "rel": "full" }
        });
        let res = NetworkResource::from_value(&value).unwrap();
        let detail = ResourceDetail::decode(ResourceKind::Extent, &res).unwrap();
        assert_eq!(detail.link_refs().len(), 1);
    }

    #[test]
    fn service_ttl_decodes() {
        let value = json!({
            "$schema": "https://schemas.census.dev/20240701/service#",
            "serviceType": "measurement",
            "ttl": 600_000_000
        });
        let res = NetworkResource::from_value(&value).unwrap();
        match ResourceDetail::decode(ResourceKind::Service, &res).unwrap() {
            ResourceDetail::Service(svc) => assert_eq!(svc.ttl, Some(600_000_000)),
            other => panic!("expected service detail, got {other:?}"),
        }
    }
}

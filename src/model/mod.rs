//! Typed records for network resource documents.
//!
//! Documents arrive as schema-validated JSON; the boundary discriminates
//! them by `$schema` into a closed set of kinds and decodes the typed
//! core plus a kind-specific detail variant. Everything the schema leaves
//! open (duck-typed `properties`, extension fields) stays in explicit
//! string-keyed JSON maps rather than dynamic dispatch.

pub mod kind;
pub mod resource;

pub use kind::{Endpoints, ExtentDetail, ExtentParent, LinkDetail, ResourceDetail, ServiceDetail};
pub use resource::{Lifetime, LinkRef, NetworkResource, STATUS_DELETED, STATUS_UNKNOWN};

/// The closed set of resource kinds this service stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Node,
    Port,
    Link,
    Path,
    Domain,
    Service,
    Extent,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Node,
        ResourceKind::Port,
        ResourceKind::Link,
        ResourceKind::Path,
        ResourceKind::Domain,
        ResourceKind::Service,
        ResourceKind::Extent,
    ];

    /// Collection segment in URLs and in the store.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Node => "nodes",
            ResourceKind::Port => "ports",
            ResourceKind::Link => "links",
            ResourceKind::Path => "paths",
            ResourceKind::Domain => "domains",
            ResourceKind::Service => "services",
            ResourceKind::Extent => "extents",
        }
    }

    pub fn from_collection(name: &str) -> Option<ResourceKind> {
        ResourceKind::ALL
            .iter()
            .copied()
            .find(|k| k.collection() == name)
    }
}

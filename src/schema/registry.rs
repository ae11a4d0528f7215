//! Versioned schema registry.
//!
//! Holds the schema document bound to each resource kind, normalizes
//! dialects, and compiles validators once at startup. Validation is a
//! pure function of schema + candidate body.

use std::collections::HashMap;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::model::ResourceKind;
use crate::types::CensusError;

use super::dialect;

/// Base URI of the schema documents this build serves.
pub const SCHEMA_BASE: &str = "https://schemas.census.dev/20240701";

/// URI of the schema bound to `kind`.
pub fn schema_uri(kind: ResourceKind) -> String {
    let slug = match kind {
        ResourceKind::Node => "node",
        ResourceKind::Port => "port",
        ResourceKind::Link => "link",
        ResourceKind::Path => "path",
        ResourceKind::Domain => "domain",
        ResourceKind::Service => "service",
        ResourceKind::Extent => "extent",
    };
    format!("{SCHEMA_BASE}/{slug}#")
}

const RAW_DOCUMENTS: [&str; 9] = [
    include_str!("schemas/networkresource.json"),
    include_str!("schemas/linkref.json"),
    include_str!("schemas/node.json"),
    include_str!("schemas/port.json"),
    include_str!("schemas/link.json"),
    include_str!("schemas/path.json"),
    include_str!("schemas/domain.json"),
    include_str!("schemas/service.json"),
    include_str!("schemas/extent.json"),
];

pub struct SchemaRegistry {
    validators: HashMap<ResourceKind, JSONSchema>,
}

impl SchemaRegistry {
    /// Parse, normalize, and compile the embedded schema corpus.
    pub fn new() -> Result<SchemaRegistry, CensusError> {
        let mut corpus = HashMap::new();
        for raw in RAW_DOCUMENTS {
            let doc: Value = serde_json::from_str(raw)
                .map_err(|e| CensusError::Store(format!("embedded schema is not json: {e}")))?;
            let uri = doc
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| CensusError::Store("embedded schema has no id".into()))?
                .to_string();
            corpus.insert(uri, doc);
        }

        let mut validators = HashMap::new();
        for kind in ResourceKind::ALL {
            let uri = schema_uri(kind);
            let normalized = dialect::normalize(&uri, &corpus)
                .map_err(|e| CensusError::Store(format!("schema '{uri}': {e}")))?;
            let compiled = JSONSchema::options()
                .with_draft(Draft::Draft4)
                .compile(&normalized)
                .map_err(|e| {
                    CensusError::Store(format!("schema '{uri}' failed to compile: {e}"))
                })?;
            validators.insert(kind, compiled);
        }
        Ok(SchemaRegistry { validators })
    }

    /// Validate a candidate body against the schema bound to `kind`.
    ///
    /// The body's `$schema` must name exactly that schema; any other URI
    /// is rejected as unknown. Violations are reported as a structured
    /// `message at /instance/path` list.
    pub fn validate(&self, kind: ResourceKind, body: &Value) -> Result<(), CensusError> {
        let expected = schema_uri(kind);
        match body.get("$schema") {
            Some(Value::String(found)) if *found == expected => {}
            Some(Value::String(found)) => return Err(CensusError::UnknownSchema(found.clone())),
            Some(other) => return Err(CensusError::UnknownSchema(other.to_string())),
            None => {
                return Err(CensusError::SchemaViolation(
                    "document carries no '$schema'".into(),
                ))
            }
        }

        let validator = self
            .validators
            .get(&kind)
            .ok_or_else(|| CensusError::Store(format!("no validator for '{expected}'")))?;
        if let Err(errors) = validator.validate(body) {
            let report: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{e} at {path}")
                    }
                })
                .collect();
            return Err(CensusError::SchemaViolation(report.join("; ")));
        }
        Ok(())
    }
}

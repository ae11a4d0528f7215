//! JSON-Schema registry and dialect handling.

pub mod dialect;
pub mod registry;

pub use registry::{schema_uri, SchemaRegistry, SCHEMA_BASE};

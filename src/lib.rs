//! Census - network topology metadata service
//!
//! Clients create, replace, delete, and read structured network
//! resource documents (nodes, links, ports, paths, domains, services,
//! storage extents) over HTTP with JSON-Schema-validated bodies,
//! hypermedia relation links, soft deletion, conflict-safe writes, and
//! TTL-based expiration of service registry entries.
//!
//! ## Components
//!
//! - **Schema registry**: versioned JSON-Schema documents per kind,
//!   draft-03/draft-04 dialects, compiled validators
//! - **Identity & link resolver**: store-assigned ids, canonical
//!   self-links, relation/endpoint reference resolution
//! - **Write transaction manager**: all-or-nothing commits with
//!   explicit rollback-failure reporting
//! - **Tombstone tracker**: soft deletion with timestamped tombstones
//! - **Expiration sweeper**: recurring removal of expired service
//!   registry entries

pub mod config;
pub mod db;
pub mod engine;
pub mod model;
pub mod schema;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{CensusError, Result};

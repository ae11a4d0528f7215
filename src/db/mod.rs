//! Document store seam.
//!
//! The engine talks to storage through the [`DocumentStore`] trait. Two
//! implementations exist: [`MemoryStore`] for dev mode and tests, and
//! [`MongoStore`] for production.

pub mod memory;
pub mod mongo;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use store::{DocumentStore, Precondition, StoredDoc, VersionWrite, WriteError};

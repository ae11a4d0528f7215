//! HTTP server and request handlers.

pub mod http;
pub mod resources;

pub use http::{run, AppState};

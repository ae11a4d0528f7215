//! Error types shared across the service.
//!
//! Every failure that reaches the HTTP boundary is reported as a
//! `(numeric application code, message)` pair on top of the HTTP status.
//! The application codes are stable and distinct per condition so that
//! clients can dispatch on them without parsing message text.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CensusError>;

/// The HTTP verb a gate or method check was evaluated for.
///
/// Several conditions (method-not-allowed, not-acceptable, unsupported
/// media type) carry a verb-specific application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Post,
    Put,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Post => write!(f, "POST"),
            Verb::Put => write!(f, "PUT"),
            Verb::Delete => write!(f, "DELETE"),
        }
    }
}

/// Service-wide error type.
#[derive(Debug, Error)]
pub enum CensusError {
    /// Request body was not parseable JSON.
    #[error("malformed json request '{0}'")]
    MalformedBody(String),

    /// `$schema` (or the Content-Type profile) named a schema this
    /// registry does not serve.
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    /// Body parsed as JSON but does not conform to the collection schema.
    #[error("document does not match schema: {0}")]
    SchemaViolation(String),

    /// A client supplied an `id` on create; ids are always store-assigned.
    #[error("id '{0}' must not be supplied when creating a resource")]
    IdentitySupplied(String),

    /// A `relations` or `endpoints` reference named a same-store id that
    /// does not resolve to a live resource.
    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),

    /// Replace where the body id does not match the URL id.
    #[error("body id '{body_id}' does not match URL id '{url_id}'")]
    IdMismatch { url_id: String, body_id: String },

    /// No live or tombstoned resource with this id.
    #[error("could not find resource with id '{id}'")]
    NotFound { id: String, during_delete: bool },

    /// POST to a specific resource id.
    #[error("cannot POST to a specific id; POST to the collection instead")]
    PostToId,

    /// PUT or DELETE without a specific resource id.
    #[error("{verb} is allowed only for specific resources; add an id at the end of the URL")]
    MissingId { verb: Verb },

    /// None of the requested Accept types are supported.
    #[error("unsupported accept content type '{ctype}'")]
    NotAcceptable { verb: Verb, ctype: String },

    /// Request Content-Type is not supported for this verb.
    #[error("no {verb} handler for content type '{ctype}'")]
    UnsupportedMedia { verb: Verb, ctype: String },

    /// Write conflict; the partial transaction was rolled back.
    #[error("write conflict: {cause}; transaction rolled back")]
    Conflict { cause: String },

    /// Write conflict and the rollback itself failed. The store may hold
    /// a partially applied transaction; operators must be able to see
    /// both causes.
    #[error("write conflict: {cause}; rollback FAILED: {rollback_error}")]
    ConflictRollbackFailed {
        cause: String,
        rollback_error: String,
    },

    /// Operation against a tombstoned resource.
    #[error("resource already deleted at timestamp='{deleted_ts}'")]
    Gone { deleted_ts: i64 },

    /// Store read/enumerate failure unrelated to validation.
    #[error("store error: {0}")]
    Store(String),

    /// Failed to load the resource while handling a delete.
    #[error("couldn't load the resource: '{0}'")]
    DeleteLoad(String),

    /// Failed to write the tombstone while handling a delete.
    #[error("couldn't delete resource: '{0}'")]
    DeleteWrite(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CensusError {
    /// HTTP status for this condition.
    pub fn status(&self) -> u16 {
        match self {
            CensusError::MalformedBody(_)
            | CensusError::UnknownSchema(_)
            | CensusError::SchemaViolation(_)
            | CensusError::IdentitySupplied(_)
            | CensusError::UnresolvedReference(_)
            | CensusError::IdMismatch { .. } => 400,
            CensusError::NotFound { .. } => 404,
            CensusError::PostToId | CensusError::MissingId { .. } => 405,
            CensusError::NotAcceptable { .. } => 406,
            CensusError::Conflict { .. } | CensusError::ConflictRollbackFailed { .. } => 409,
            CensusError::Gone { .. } => 410,
            CensusError::UnsupportedMedia { .. } => 415,
            CensusError::Store(_)
            | CensusError::DeleteLoad(_)
            | CensusError::DeleteWrite(_)
            | CensusError::Io(_) => 500,
        }
    }

    /// Numeric application code, distinct per condition.
    pub fn code(&self) -> u32 {
        match self {
            CensusError::MalformedBody(_) => 400_001,
            CensusError::UnknownSchema(_) => 400_002,
            CensusError::SchemaViolation(_) => 400_003,
            CensusError::IdentitySupplied(_) => 400_004,
            CensusError::UnresolvedReference(_) => 400_006,
            CensusError::IdMismatch { .. } => 400_008,
            CensusError::NotFound { during_delete, .. } => {
                if *during_delete {
                    404_002
                } else {
                    404_001
                }
            }
            CensusError::PostToId => 405_001,
            CensusError::MissingId { verb } => match verb {
                Verb::Put => 405_002,
                _ => 405_003,
            },
            CensusError::NotAcceptable { verb, .. } => match verb {
                Verb::Post => 406_001,
                Verb::Put => 406_002,
                Verb::Delete => 406_003,
            },
            CensusError::Conflict { .. } => 409_001,
            CensusError::ConflictRollbackFailed { .. } => 409_002,
            CensusError::Gone { .. } => 410_001,
            CensusError::UnsupportedMedia { verb, .. } => match verb {
                Verb::Put => 415_002,
                _ => 415_001,
            },
            CensusError::DeleteLoad(_) => 500_005,
            CensusError::DeleteWrite(_) => 500_006,
            CensusError::Store(_) | CensusError::Io(_) => 500_001,
        }
    }
}

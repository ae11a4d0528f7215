//! Content negotiation gate.
//!
//! Runs before any other component touches a write request: an
//! unsupported Content-Type or an unsatisfiable Accept header is
//! rejected here with the verb-specific application code.

use crate::types::{CensusError, Result, Verb};

pub const MEDIA_JSON: &str = "application/json";
pub const MEDIA_TOPOLOGY: &str = "application/topology+json";

fn base_type(header: &str) -> &str {
    header.split(';').next().unwrap_or("").trim()
}

/// `profile=` parameter of a Content-Type header, if present.
fn profile_param(header: &str) -> Option<&str> {
    header.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("profile") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

/// Check the request Content-Type for POST/PUT.
///
/// The body format must be JSON (plain or the topology vendor type). A
/// `profile` parameter, when present, must name the collection's schema;
/// a mismatched profile is a schema error rather than a media-type one.
pub fn check_content_type(verb: Verb, header: Option<&str>, schema_uri: &str) -> Result<()> {
    let header = header.unwrap_or("").trim();
    if header.is_empty() {
        return Err(CensusError::UnsupportedMedia {
            verb,
            ctype: "<missing>".to_string(),
        });
    }
    let base = base_type(header);
    if base != MEDIA_JSON && base != MEDIA_TOPOLOGY {
        return Err(CensusError::UnsupportedMedia {
            verb,
            ctype: base.to_string(),
        });
    }
    if let Some(profile) = profile_param(header) {
        if profile != schema_uri {
            return Err(CensusError::UnknownSchema(profile.to_string()));
        }
    }
    Ok(())
}

/// Check the Accept header for POST/PUT/DELETE.
///
/// An absent header (or `*/*`) resolves to JSON; otherwise at least one
/// listed type must be serveable.
pub fn check_accept(verb: Verb, header: Option<&str>) -> Result<()> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => return Ok(()),
    };
    let acceptable = header.split(',').any(|entry| {
        let media = base_type(entry);
        media == "*/*" || media == "application/*" || media == MEDIA_JSON || media == MEDIA_TOPOLOGY
    });
    if acceptable {
        Ok(())
    } else {
        Err(CensusError::NotAcceptable {
            verb,
            ctype: header.trim().to_string(),
        })
    }
}

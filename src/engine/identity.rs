//! Identity assignment and relation link resolution.
//!
//! Ids are always store-assigned: a create must not carry one, a
//! replace must carry exactly the URL's. Link descriptors in
//! `relations`, link `endpoints`, and extent parents either point at an
//! external absolute URI (accepted unresolved) or name a same-store
//! resource that must exist. Resolution itself is pure; the engine
//! snapshots the referenced ids from the store first.

use std::collections::HashSet;

use bson::oid::ObjectId;

use crate::model::{NetworkResource, ResourceDetail, ResourceKind};
use crate::types::{CensusError, Result};

/// Assign a fresh id for a create. The body must not carry one.
pub fn resolve_for_create(body: &NetworkResource) -> Result<String> {
    if let Some(id) = &body.id {
        return Err(CensusError::IdentitySupplied(id.clone()));
    }
    Ok(ObjectId::new().to_hex())
}

/// Verify a replace targets the resource the URL names.
pub fn resolve_for_replace(url_id: &str, body: &NetworkResource) -> Result<()> {
    match &body.id {
        Some(body_id) if body_id == url_id => Ok(()),
        Some(body_id) => Err(CensusError::IdMismatch {
            url_id: url_id.to_string(),
            body_id: body_id.clone(),
        }),
        None => Err(CensusError::IdMismatch {
            url_id: url_id.to_string(),
            body_id: "<absent>".to_string(),
        }),
    }
}

/// Canonical self-link for a resource.
pub fn self_ref(base_url: &str, kind: ResourceKind, id: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), kind.collection(), id)
}

/// Every link-descriptor href a document carries: the core `relations`
/// map plus whatever the kind detail contributes (link endpoints,
/// extent parent).
pub fn collect_hrefs(resource: &NetworkResource, detail: &ResourceDetail) -> Vec<String> {
    let mut hrefs: Vec<String> = resource
        .relations
        .values()
        .flatten()
        .map(|link| link.href.clone())
        .collect();
    hrefs.extend(detail.link_refs().iter().map(|link| link.href.clone()));
    hrefs
}

/// The same-store ids a set of hrefs refers to. Absolute URIs under
/// `base_url` are stripped back to their id; other absolute URIs are
/// external and contribute nothing; everything else is taken as an id.
pub fn local_targets(hrefs: &[String], base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    hrefs
        .iter()
        .filter_map(|href| {
            if let Some(rest) = href.strip_prefix(base) {
                // "/collection/id" under our own base URL.
                rest.trim_start_matches('/')
                    .split('/')
                    .nth(1)
                    .map(str::to_string)
            } else if href.contains("://") {
                None
            } else {
                Some(href.clone())
            }
        })
        .collect()
}

/// Fail on the first href whose same-store target is not in `known`.
pub fn verify_resolved(
    hrefs: &[String],
    base_url: &str,
    known: &HashSet<String>,
) -> Result<()> {
    for href in hrefs {
        let targets = local_targets(std::slice::from_ref(href), base_url);
        for target in targets {
            if !known.contains(&target) {
                return Err(CensusError::UnresolvedReference(href.clone()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "http://census.example.net:8888";

    fn resource(value: serde_json::Value) -> NetworkResource {
        NetworkResource::from_value(&value).unwrap()
    }

    #[test]
    fn create_rejects_client_supplied_id() {
        let body = resource(json!({
            "$schema": "https://schemas.census.dev/20240701/node#",
            "id": "abc123",
        }));
        match resolve_for_create(&body) {
            Err(err @ CensusError::IdentitySupplied(_)) => {
                assert_eq!(err.code(), 400_004);
                assert!(err.to_string().contains("abc123"));
            }
            other => panic!("expected identity conflict, got {other:?}"),
        }
    }

    #[test]
    fn create_assigns_distinct_ids() {
        let body = resource(json!({
            "$schema": "https://schemas.census.dev/20240701/node#",
        }));
        let a = resolve_for_create(&body).unwrap();
        let b = resolve_for_create(&body).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 24);
    }

    #[test]
    fn replace_requires_matching_id() {
        let body = resource(json!({
            "$schema": "https://schemas.census.dev/20240701/node#",
            "id": "abc123",
        }));
        resolve_for_replace("abc123", &body).unwrap();
        assert_eq!(
            resolve_for_replace("other", &body).unwrap_err().code(),
            400_008
        );

        let no_id = resource(json!({
            "$schema": "https://schemas.census.dev/20240701/node#",
        }));
        assert!(matches!(
            resolve_for_replace("abc123", &no_id),
            Err(CensusError::IdMismatch { .. })
        ));
    }

    #[test]
    fn self_ref_is_deterministic() {
        assert_eq!(
            self_ref(BASE, ResourceKind::Port, "p1"),
            "http://census.example.net:8888/ports/p1"
        );
        assert_eq!(
            self_ref(&format!("{BASE}/"), ResourceKind::Port, "p1"),
            "http://census.example.net:8888/ports/p1"
        );
    }

    #[test]
    fn local_targets_classify_hrefs() {
        let hrefs = vec![
            format!("{BASE}/ports/p1"),
            "https://elsewhere.net/ports/p9".to_string(),
            "bare-id".to_string(),
        ];
        let targets = local_targets(&hrefs, BASE);
        assert_eq!(targets, vec!["p1".to_string(), "bare-id".to_string()]);
    }

    #[test]
    fn unresolved_local_reference_fails_with_the_href() {
        let hrefs = vec![format!("{BASE}/ports/missing")];
        let known: HashSet<String> = ["p1".to_string()].into();
        match verify_resolved(&hrefs, BASE, &known) {
            Err(err @ CensusError::UnresolvedReference(_)) => {
                assert_eq!(err.code(), 400_006);
                assert!(err.to_string().contains("missing"));
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
    }

    #[test]
    fn external_uris_are_accepted_unresolved() {
        let hrefs = vec!["https://elsewhere.net/nodes/n1".to_string()];
        verify_resolved(&hrefs, BASE, &HashSet::new()).unwrap();
    }
}

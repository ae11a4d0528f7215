//! Schema dialect handling.
//!
//! The registry accepts both draft-03 and draft-04 documents. The
//! validator itself only speaks draft-04, so draft-03 documents are
//! rewritten first: `extends` is merged into the document, per-property
//! `"required": true` flags become a draft-04 `required` array, and
//! `$ref`s to other registry documents are inlined so that compilation
//! never reaches out to the network.

use std::collections::HashMap;

use serde_json::{Map, Value};

pub const DRAFT3_URI: &str = "http://json-schema.org/draft-03/schema#";
pub const DRAFT4_URI: &str = "http://json-schema.org/draft-04/schema#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Draft3,
    Draft4,
}

/// Identify the dialect a schema document declares conformance to.
pub fn detect(doc: &Value) -> Result<Dialect, String> {
    match doc.get("$schema").and_then(Value::as_str) {
        Some(DRAFT3_URI) => Ok(Dialect::Draft3),
        Some(DRAFT4_URI) | None => Ok(Dialect::Draft4),
        Some(other) => Err(format!("unsupported schema dialect '{other}'")),
    }
}

/// Produce the draft-04 form of the corpus document registered at `uri`,
/// with all registry-internal references inlined.
pub fn normalize(uri: &str, corpus: &HashMap<String, Value>) -> Result<Value, String> {
    let mut visiting = Vec::new();
    normalize_uri(uri, corpus, &mut visiting)
}

fn normalize_uri(
    uri: &str,
    corpus: &HashMap<String, Value>,
    visiting: &mut Vec<String>,
) -> Result<Value, String> {
    if visiting.iter().any(|v| v == uri) {
        return Err(format!("schema reference cycle through '{uri}'"));
    }
    let doc = corpus
        .get(uri)
        .ok_or_else(|| format!("unresolvable schema reference '{uri}'"))?;
    visiting.push(uri.to_string());
    let result = normalize_doc(doc, corpus, visiting);
    visiting.pop();
    result
}

fn normalize_doc(
    doc: &Value,
    corpus: &HashMap<String, Value>,
    visiting: &mut Vec<String>,
) -> Result<Value, String> {
    let dialect = detect(doc)?;
    let mut doc = doc.clone();
    if let Value::Object(map) = &mut doc {
        map.remove("$schema");
        map.remove("id");
        map.remove("name");
    }
    if dialect == Dialect::Draft3 {
        let (converted, _) = hoist_required_flags(doc);
        doc = merge_extends(converted, corpus, visiting)?;
    }
    inline_refs(&mut doc, corpus, visiting)?;
    Ok(doc)
}

/// Rewrite draft-03 per-property `"required": true` markers into
/// draft-04 `required` arrays, recursing into nested subschemas.
/// Returns the rewritten schema and whether it carried a flag itself.
fn hoist_required_flags(value: Value) -> (Value, bool) {
    let Value::Object(mut map) = value else {
        return (value, false);
    };

    let own_flag = match map.get("required") {
        Some(Value::Bool(flag)) => {
            let flag = *flag;
            map.remove("required");
            flag
        }
        _ => false,
    };

    let mut required: Vec<Value> = match map.remove("required") {
        Some(Value::Array(names)) => names,
        _ => Vec::new(),
    };

    if let Some(Value::Object(props)) = map.remove("properties") {
        let mut rewritten = Map::new();
        for (name, sub) in props {
            let (sub, flag) = hoist_required_flags(sub);
            if flag && !required.iter().any(|r| r.as_str() == Some(&name)) {
                required.push(Value::String(name.clone()));
            }
            rewritten.insert(name, sub);
        }
        map.insert("properties".to_string(), Value::Object(rewritten));
    }
    if !required.is_empty() {
        map.insert("required".to_string(), Value::Array(required));
    }

    for key in ["items", "additionalProperties", "extends"] {
        if let Some(sub) = map.remove(key) {
            if sub.is_object() {
                let (sub, _) = hoist_required_flags(sub);
                map.insert(key.to_string(), sub);
            } else {
                map.insert(key.to_string(), sub);
            }
        }
    }
    if let Some(Value::Object(patterns)) = map.remove("patternProperties") {
        let mut rewritten = Map::new();
        for (pattern, sub) in patterns {
            let (sub, _) = hoist_required_flags(sub);
            rewritten.insert(pattern, sub);
        }
        map.insert("patternProperties".to_string(), Value::Object(rewritten));
    }

    (Value::Object(map), own_flag)
}

/// Fold a draft-03 `extends: {$ref}` base document into the extending
/// schema: base properties first (the child overrides), `required`
/// arrays unioned, `type`/`additionalProperties` inherited when absent.
fn merge_extends(
    value: Value,
    corpus: &HashMap<String, Value>,
    visiting: &mut Vec<String>,
) -> Result<Value, String> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    let Some(extends) = map.remove("extends") else {
        return Ok(Value::Object(map));
    };
    let base_uri = extends
        .get("$ref")
        .and_then(Value::as_str)
        .ok_or_else(|| "'extends' must carry a $ref".to_string())?;
    let base = normalize_uri(base_uri, corpus, visiting)?;
    let Value::Object(base_map) = base else {
        return Err(format!("base schema '{base_uri}' is not an object"));
    };

    let mut properties = match base_map.get("properties") {
        Some(Value::Object(props)) => props.clone(),
        _ => Map::new(),
    };
    if let Some(Value::Object(own)) = map.get("properties") {
        for (name, sub) in own {
            properties.insert(name.clone(), sub.clone());
        }
    }
    if !properties.is_empty() {
        map.insert("properties".to_string(), Value::Object(properties));
    }

    let mut required: Vec<Value> = match base_map.get("required") {
        Some(Value::Array(names)) => names.clone(),
        _ => Vec::new(),
    };
    if let Some(Value::Array(own)) = map.get("required") {
        for name in own {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }
    }
    if !required.is_empty() {
        map.insert("required".to_string(), Value::Array(required));
    }

    for key in ["type", "additionalProperties"] {
        if !map.contains_key(key) {
            if let Some(inherited) = base_map.get(key) {
                map.insert(key.to_string(), inherited.clone());
            }
        }
    }

    Ok(Value::Object(map))
}

fn inline_refs(
    value: &mut Value,
    corpus: &HashMap<String, Value>,
    visiting: &mut Vec<String>,
) -> Result<(), String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(uri)) = map.get("$ref") {
                let uri = uri.clone();
                if corpus.contains_key(&uri) {
                    *value = normalize_uri(&uri, corpus, visiting)?;
                    return Ok(());
                }
                return Err(format!("unresolvable schema reference '{uri}'"));
            }
            for (_, sub) in map.iter_mut() {
                inline_refs(sub, corpus, visiting)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                inline_refs(item, corpus, visiting)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn corpus(docs: &[Value]) -> HashMap<String, Value> {
        docs.iter()
            .map(|d| (d["id"].as_str().unwrap().to_string(), d.clone()))
            .collect()
    }

    #[test]
    fn detects_dialects() {
        assert_eq!(
            detect(&json!({ "$schema": DRAFT3_URI })).unwrap(),
            Dialect::Draft3
        );
        assert_eq!(
            detect(&json!({ "$schema": DRAFT4_URI })).unwrap(),
            Dialect::Draft4
        );
        assert!(detect(&json!({ "$schema": "http://json-schema.org/draft-07/schema#" })).is_err());
    }

    #[test]
    fn hoists_required_flags_recursively() {
        let doc = json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "required": true },
                "address": {
                    "type": "object",
                    "properties": {
                        "octets": { "type": "string", "required": true }
                    }
                }
            }
        });
        let (converted, _) = hoist_required_flags(doc);
        assert_eq!(converted["required"], json!(["kind"]));
        assert_eq!(
            converted["properties"]["address"]["required"],
            json!(["octets"])
        );
        assert!(converted["properties"]["kind"].get("required").is_none());
    }

    #[test]
    fn merges_extends_into_child() {
        let base = json!({
            "$schema": DRAFT3_URI,
            "id": "https://example.net/base#",
            "type": "object",
            "additionalProperties": true,
            "properties": {
                "id": { "type": "string" },
                "ts": { "type": "integer", "required": true }
            }
        });
        let child = json!({
            "$schema": DRAFT3_URI,
            "id": "https://example.net/child#",
            "type": "object",
            "extends": { "$ref": "https://example.net/base#" },
            "properties": {
                "ports": { "type": "array" }
            }
        });
        let corpus = corpus(&[base, child]);
        let normalized = normalize("https://example.net/child#", &corpus).unwrap();
        assert!(normalized["properties"].get("id").is_some());
        assert!(normalized["properties"].get("ports").is_some());
        assert_eq!(normalized["required"], json!(["ts"]));
        assert_eq!(normalized["additionalProperties"], json!(true));
    }

    #[test]
    fn rejects_reference_cycles() {
        let a = json!({
            "$schema": DRAFT3_URI,
            "id": "https://example.net/a#",
            "type": "object",
            "extends": { "$ref": "https://example.net/b#" }
        });
        let b = json!({
            "$schema": DRAFT3_URI,
            "id": "https://example.net/b#",
            "type": "object",
            "extends": { "$ref": "https://example.net/a#" }
        });
        let corpus = corpus(&[a, b]);
        let err = normalize("https://example.net/a#", &corpus).unwrap_err();
        assert!(err.contains("cycle"), "unexpected error: {err}");
    }

    #[test]
    fn rejects_unknown_references() {
        let doc = json!({
            "$schema": DRAFT4_URI,
            "id": "https://example.net/solo#",
            "type": "object",
            "properties": {
                "thing": { "$ref": "https://elsewhere.net/unknown#" }
            }
        });
        let corpus = corpus(&[doc]);
        let err = normalize("https://example.net/solo#", &corpus).unwrap_err();
        assert!(err.contains("unresolvable"), "unexpected error: {err}");
    }
}

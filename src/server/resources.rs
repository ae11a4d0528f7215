//! Per-collection request handlers.
//!
//! Routes are `/{collection}` and `/{collection}/{id}`; the root serves
//! the collection index. Writes are gated in order: Accept (406),
//! method/id (405), Content-Type (415), body parsing (400), then the
//! engine pipeline; everything reports through the shared
//! `(code, message)` error shape.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::engine::negotiate::{self, MEDIA_JSON};
use crate::model::ResourceKind;
use crate::schema::schema_uri;
use crate::types::{CensusError, Verb};

use super::AppState;

/// Parsed resource route components.
#[derive(Debug)]
struct ResourceRoute<'a> {
    kind: ResourceKind,
    id: Option<&'a str>,
}

impl<'a> ResourceRoute<'a> {
    /// Parse "/{collection}" or "/{collection}/{id}".
    fn parse(path: &'a str) -> Option<Self> {
        let stripped = path.strip_prefix('/')?;
        let mut parts = stripped.splitn(2, '/');
        let collection = parts.next().filter(|s| !s.is_empty())?;
        let kind = ResourceKind::from_collection(collection)?;
        let id = parts.next().map(|s| s.trim_end_matches('/')).filter(|s| !s.is_empty());
        Some(Self { kind, id })
    }
}

/// Error response body: `{"code": <u32>, "message": "..."}`.
fn error_response(err: &CensusError) -> Response<Full<Bytes>> {
    let body = json!({ "code": err.code(), "message": err.to_string() });
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder()
        .status(StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .header(CONTENT_TYPE, MEDIA_JSON)
        .body(Full::new(Bytes::from(bytes)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"code":500001,"message":"internal error"}"#)))
                .unwrap()
        })
}

fn json_response(status: StatusCode, value: &Value) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, MEDIA_JSON)
        .body(Full::new(Bytes::from(bytes)))
        .unwrap()
}

fn created_response(value: &Value, location: Option<&str>) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let mut builder = Response::builder()
        .status(StatusCode::CREATED)
        .header(CONTENT_TYPE, MEDIA_JSON);
    if let Some(location) = location {
        builder = builder.header(LOCATION, location);
    }
    builder.body(Full::new(Bytes::from(bytes))).unwrap()
}

fn method_not_allowed() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Allow", "GET, POST, PUT, DELETE")
        .header(CONTENT_TYPE, MEDIA_JSON)
        .body(Full::new(Bytes::from(r#"{"error":"method not allowed"}"#)))
        .unwrap()
}

/// Route one request through the engine.
pub async fn handle(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let content_type = header_value(&req, CONTENT_TYPE);
    let accept = header_value(&req, ACCEPT);

    debug!(method = %method, path = %path, "request");

    if path == "/" {
        return Ok(match method {
            Method::GET => json_response(StatusCode::OK, &state.engine.root_document()),
            _ => method_not_allowed(),
        });
    }

    let Some(route) = ResourceRoute::parse(&path) else {
        let err = CensusError::NotFound {
            id: path.clone(),
            during_delete: false,
        };
        return Ok(error_response(&err));
    };
    let kind = route.kind;

    let response = match (method, route.id) {
        (Method::GET, None) => match state.engine.list(kind).await {
            Ok(docs) => json_response(StatusCode::OK, &Value::Array(docs)),
            Err(e) => error_response(&e),
        },
        (Method::GET, Some(id)) => match state.engine.get(kind, id).await {
            Ok(doc) => json_response(StatusCode::OK, &doc),
            Err(e) => error_response(&e),
        },

        // The Accept gate runs before anything else looks at a write
        // request, including the method/id checks.
        (Method::POST, id) => {
            if let Err(e) = negotiate::check_accept(Verb::Post, accept.as_deref()) {
                return Ok(error_response(&e));
            }
            if id.is_some() {
                return Ok(error_response(&CensusError::PostToId));
            }
            if let Err(e) = negotiate::check_content_type(
                Verb::Post,
                content_type.as_deref(),
                &schema_uri(kind),
            ) {
                return Ok(error_response(&e));
            }
            let payload = match read_json(req).await? {
                Ok(v) => v,
                Err(e) => return Ok(error_response(&e)),
            };
            match state.engine.create(kind, &payload).await {
                Ok(stored) => {
                    let location = stored
                        .first()
                        .and_then(|doc| doc.get("selfRef"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let body = if payload.is_array() {
                        Value::Array(stored)
                    } else {
                        stored.into_iter().next().unwrap_or(Value::Null)
                    };
                    created_response(&body, location.as_deref())
                }
                Err(e) => error_response(&e),
            }
        }

        (Method::PUT, id) => {
            if let Err(e) = negotiate::check_accept(Verb::Put, accept.as_deref()) {
                return Ok(error_response(&e));
            }
            let Some(id) = id else {
                return Ok(error_response(&CensusError::MissingId { verb: Verb::Put }));
            };
            if let Err(e) = negotiate::check_content_type(
                Verb::Put,
                content_type.as_deref(),
                &schema_uri(kind),
            ) {
                return Ok(error_response(&e));
            }
            let id = id.to_string();
            let payload = match read_json(req).await? {
                Ok(v) => v,
                Err(e) => return Ok(error_response(&e)),
            };
            match state.engine.replace(kind, &id, &payload).await {
                Ok(stored) => {
                    let location = stored
                        .get("selfRef")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    created_response(&stored, location.as_deref())
                }
                Err(e) => error_response(&e),
            }
        }

        (Method::DELETE, id) => {
            if let Err(e) = negotiate::check_accept(Verb::Delete, accept.as_deref()) {
                return Ok(error_response(&e));
            }
            let Some(id) = id else {
                return Ok(error_response(&CensusError::MissingId { verb: Verb::Delete }));
            };
            match state.engine.delete(kind, id).await {
                Ok(tombstone) => json_response(StatusCode::OK, &tombstone),
                Err(e) => error_response(&e),
            }
        }

        _ => method_not_allowed(),
    };
    Ok(response)
}

fn header_value(req: &Request<Incoming>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Collect the body and parse it as JSON; a syntax failure is the
/// malformed-body condition.
async fn read_json(
    req: Request<Incoming>,
) -> Result<std::result::Result<Value, CensusError>, hyper::Error> {
    let bytes = req.collect().await?.to_bytes();
    Ok(serde_json::from_slice::<Value>(&bytes)
        .map_err(|e| CensusError::MalformedBody(e.to_string())))
}

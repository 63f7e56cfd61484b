// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Canonical event payload built from an inbound HTTP request.
//!
//! ```json
//! {
//!   "method": "POST",
//!   "path": "/webhook",
//!   "headers": {"Content-Type": "application/json", "X-Multi": ["a", "b"]},
//!   "query": {"page": "1"},
//!   "body": {"parsed": "json"},
//!   "raw_body": "{\"parsed\": \"json\"}",
//!   "remote_addr": "10.0.0.1:52311"
//! }
//! ```
//!
//! Single values are scalars, repeated values are lists, in arrival order.

use std::net::SocketAddr;

use http::{header, HeaderMap, Method};
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::domain::auth::API_KEY_HEADER;

/// Transport-independent view of an HTTP request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    /// Decoded query pairs, in order, duplicates kept
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }

    /// `"POST /webhook"`
    pub fn source(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// `x-request-id` → `X-Request-Id`
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn push_value(map: &mut Map<String, Value>, key: String, value: String) {
    match map.get_mut(&key) {
        None => {
            map.insert(key, Value::String(value));
        }
        Some(Value::Array(items)) => items.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
    }
}

/// Header map with scalar/list values. The API key header, in any case, is
/// always surfaced as `X-API-Key`. `Host` is request-line data and is left out.
pub fn header_map(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    let mut api_keys = Vec::new();

    for (name, value) in headers {
        if name == header::HOST {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        if name.as_str().eq_ignore_ascii_case(API_KEY_HEADER) {
            api_keys.push(value);
            continue;
        }
        push_value(&mut map, canonical_header_name(name.as_str()), value);
    }

    for key in api_keys {
        push_value(&mut map, API_KEY_HEADER.to_string(), key);
    }

    Value::Object(map)
}

pub fn query_map(pairs: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        push_value(&mut map, key.clone(), value.clone());
    }
    Value::Object(map)
}

pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("application/json") || ct.contains("+json")
        })
        .unwrap_or(false)
}

/// JSON bodies are decoded; anything else, or JSON that fails to parse, is
/// passed through as a string.
pub fn body_value(headers: &HeaderMap, body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::String(String::new());
    }
    if is_json_content_type(headers) {
        if let Ok(parsed) = serde_json::from_slice::<Value>(body) {
            return parsed;
        }
    }
    Value::String(String::from_utf8_lossy(body).into_owned())
}

pub fn build_payload(request: &InboundRequest) -> Value {
    let mut payload = Map::new();
    payload.insert("method".into(), Value::String(request.method.to_string()));
    payload.insert("path".into(), Value::String(request.path.clone()));
    payload.insert("headers".into(), header_map(&request.headers));
    payload.insert("query".into(), query_map(&request.query));
    payload.insert("body".into(), body_value(&request.headers, &request.body));
    payload.insert(
        "raw_body".into(),
        Value::String(String::from_utf8_lossy(&request.body).into_owned()),
    );
    payload.insert(
        "remote_addr".into(),
        Value::String(request.remote_addr.map(|a| a.to_string()).unwrap_or_default()),
    );
    Value::Object(payload)
}

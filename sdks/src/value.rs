// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Structured value codec
//!
//! Converts between the wire `Value` type and `serde_json::Value`, the native
//! representation plugins work with.
//!
//! | Wire              | JSON                          |
//! |-------------------|-------------------------------|
//! | null / unset      | `null`                        |
//! | string            | string                        |
//! | int               | integer                       |
//! | double            | number (`null` if non-finite) |
//! | bool              | bool                          |
//! | bytes             | base64 string                 |
//! | list              | array                         |
//! | map               | object                        |

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number};

use crate::proto::{value::Kind, ListValue, MapValue, Value};

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Self {
            kind: Some(Kind::StringValue(s.into())),
        }
    }

    /// Convert to JSON. See the module table for the mapping.
    pub fn to_json(&self) -> serde_json::Value {
        match &self.kind {
            None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
            Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
            Some(Kind::IntValue(i)) => serde_json::Value::Number((*i).into()),
            Some(Kind::DoubleValue(d)) => Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
            Some(Kind::BytesValue(b)) => serde_json::Value::String(STANDARD.encode(b)),
            Some(Kind::ListValue(list)) => {
                serde_json::Value::Array(list.values.iter().map(Value::to_json).collect())
            }
            Some(Kind::MapValue(map)) => serde_json::Value::Object(
                map.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        let kind = match json {
            serde_json::Value::Null => Kind::NullValue(0),
            serde_json::Value::Bool(b) => Kind::BoolValue(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Kind::IntValue(i),
                None => Kind::DoubleValue(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Kind::StringValue(s.clone()),
            serde_json::Value::Array(items) => Kind::ListValue(ListValue {
                values: items.iter().map(Value::from_json).collect(),
            }),
            serde_json::Value::Object(obj) => Kind::MapValue(MapValue {
                fields: obj
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect::<HashMap<_, _>>(),
            }),
        };
        Self { kind: Some(kind) }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_json()
    }
}

/// Convert a map of wire values (e.g. `RunRequest.parameters`) to a JSON object.
pub fn map_to_json(map: &HashMap<String, Value>) -> serde_json::Value {
    serde_json::Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<Map<_, _>>(),
    )
}

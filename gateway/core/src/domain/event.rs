// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Trigger events produced by the HTTP front door.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation key shared by an event and its eventual workflow response.
///
/// Generated ids are UUID v4 strings, but any string received over the RPC
/// boundary is accepted so that unknown ids simply miss on lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonicalized inbound request, immutable once published.
///
/// The event manager shares one `Arc<TriggerEvent>` across every subscriber
/// queue, so fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerEvent {
    event_id: EventId,
    source: String,
    payload: serde_json::Value,
    timestamp_ms: i64,
    target_workflow: String,
}

impl TriggerEvent {
    pub fn new(
        source: impl Into<String>,
        payload: serde_json::Value,
        target_workflow: impl Into<String>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            source: source.into(),
            payload,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            target_workflow: target_workflow.into(),
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Empty means unrouted; every subscriber decides for itself.
    pub fn target_workflow(&self) -> &str {
        &self.target_workflow
    }
}

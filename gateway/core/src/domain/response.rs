// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow responses delivered back to a waiting sync request.

use std::collections::HashMap;

pub const DEFAULT_STATUS_CODE: u16 = 200;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowResponse {
    /// JSON body; `None` renders the default success envelope.
    pub body: Option<serde_json::Value>,
    /// `None` means 200.
    pub status_code: Option<u16>,
    /// Merged into the HTTP response.
    pub headers: HashMap<String, String>,
    /// Any value forces a 500 regardless of `status_code`.
    pub error: Option<String>,
}

impl WorkflowResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn effective_status(&self) -> u16 {
        self.status_code.unwrap_or(DEFAULT_STATUS_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_defaults_to_200() {
        assert_eq!(WorkflowResponse::ok(json!({})).effective_status(), 200);
        assert_eq!(WorkflowResponse::ok(json!({})).with_status(201).effective_status(), 201);
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Ingress Service
//!
//! Turns an authenticated HTTP request into a published [`TriggerEvent`] and,
//! for sync routes, waits for the correlated workflow response.
//!
//! # Architecture
//!
//! - **Layer:** Application
//! - **Purpose:** Front-door state machine, independent of the HTTP framework
//!
//! ```text
//! authenticate ─▶ build payload ─▶ [register] ─▶ publish ─┬─▶ Accepted (async)
//!                                                         ├─▶ Responded / TimedOut (sync)
//!                                                         └─▶ Saturated
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use tracing::{debug, info, warn};

use crate::application::payload::{build_payload, InboundRequest};
use crate::domain::auth::{AuthError, AuthRequest, Authenticator};
use crate::domain::event::{EventId, TriggerEvent};
use crate::domain::response::WorkflowResponse;
use crate::domain::route::{RouteConfig, DEFAULT_SYNC_TIMEOUT_MS};
use crate::infrastructure::correlation::ResponseCorrelationManager;
use crate::infrastructure::event_bus::EventManager;

pub const SYNC_HEADER: &str = "x-sync-response";
pub const SYNC_QUERY: &str = "sync_response";
pub const TIMEOUT_HEADER: &str = "x-response-timeout-ms";
pub const TIMEOUT_QUERY: &str = "response_timeout_ms";

/// Terminal state of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum IngressOutcome {
    Unauthorized { reason: AuthError },
    Accepted { event_id: EventId },
    Saturated { event_id: EventId },
    Responded { event_id: EventId, response: WorkflowResponse },
    TimedOut { event_id: EventId },
}

fn truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn positive_ms(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|ms| *ms > 0)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve sync mode for a request. `None` means async.
///
/// A request can switch sync on but never off.
pub fn sync_timeout(route: &RouteConfig, request: &InboundRequest) -> Option<Duration> {
    let requested = request.query_value(SYNC_QUERY).is_some_and(truthy)
        || header_str(&request.headers, SYNC_HEADER).is_some_and(truthy);

    if !route.sync_response && !requested {
        return None;
    }

    let timeout = header_str(&request.headers, TIMEOUT_HEADER)
        .and_then(positive_ms)
        .or_else(|| request.query_value(TIMEOUT_QUERY).and_then(positive_ms))
        .map(Duration::from_millis)
        .or_else(|| route.configured_timeout())
        .unwrap_or(Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS));

    Some(timeout)
}

#[derive(Clone)]
pub struct IngressService {
    events: Arc<EventManager>,
    responses: Arc<ResponseCorrelationManager>,
}

impl IngressService {
    pub fn new(events: Arc<EventManager>, responses: Arc<ResponseCorrelationManager>) -> Self {
        Self { events, responses }
    }

    pub async fn handle(
        &self,
        route: &RouteConfig,
        authenticator: &dyn Authenticator,
        request: InboundRequest,
    ) -> IngressOutcome {
        let method = request.method.to_string();
        let auth_request = AuthRequest {
            method: &method,
            path: &request.path,
            headers: &request.headers,
        };
        if let Err(reason) = authenticator.authenticate(&auth_request, &request.body) {
            metrics::counter!("flowgate_auth_failures_total", "strategy" => authenticator.name())
                .increment(1);
            warn!(
                path = %request.path,
                strategy = authenticator.name(),
                reason = %reason,
                "Rejected unauthenticated request"
            );
            return IngressOutcome::Unauthorized { reason };
        }

        let timeout = sync_timeout(route, &request);
        let event = TriggerEvent::new(request.source(), build_payload(&request), route.target_workflow.clone());
        let event_id = event.event_id().clone();

        // The slot must exist before any subscriber can see the event
        let pending = timeout.map(|t| self.responses.register(event_id.clone(), t));

        if let Err(e) = self.events.publish(event).await {
            warn!(event_id = %event_id, error = %e, "Failed to publish trigger event");
            drop(pending);
            return IngressOutcome::Saturated { event_id };
        }

        let Some(pending) = pending else {
            info!(event_id = %event_id, path = %request.path, "Trigger event accepted");
            return IngressOutcome::Accepted { event_id };
        };

        debug!(
            event_id = %event_id,
            timeout_ms = pending.timeout().as_millis() as u64,
            "Waiting for workflow response"
        );
        match pending.wait().await {
            Ok(response) => IngressOutcome::Responded { event_id, response },
            Err(e) => {
                metrics::counter!("flowgate_sync_timeouts_total").increment(1);
                warn!(event_id = %event_id, reason = %e, "No workflow response in time");
                IngressOutcome::TimedOut { event_id }
            }
        }
    }
}

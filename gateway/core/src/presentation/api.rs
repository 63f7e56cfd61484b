// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # HTTP Front Door
//!
//! Axum router for inbound webhooks. Every path goes through a single
//! fallback handler that consults the configured [`RouteTable`], so routes
//! can be prefix matches and are swapped as a whole when filters change.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Map HTTP requests onto [`IngressService`] and its outcomes
//!   back onto JSON responses

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::application::ingress::{IngressOutcome, IngressService};
use crate::application::payload::InboundRequest;
use crate::domain::auth::Authenticator;
use crate::domain::event::EventId;
use crate::domain::gateway_config::ServerConfig;
use crate::domain::response::{WorkflowResponse, DEFAULT_STATUS_CODE};
use crate::domain::route::RouteTable;
use crate::infrastructure::auth::build_authenticator;

pub struct GatewayState {
    ingress: IngressService,
    routes: RouteTable,
    authenticator: Arc<dyn Authenticator>,
    max_body_bytes: usize,
}

pub fn app(ingress: IngressService, config: &ServerConfig) -> Router {
    let state = Arc::new(GatewayState {
        ingress,
        routes: config.routes.clone(),
        authenticator: build_authenticator(&config.security),
        max_body_bytes: config.max_body_bytes,
    });

    Router::new()
        .fallback(handle_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn error_body(status: StatusCode, error: &str, message: Option<&str>, event_id: Option<&EventId>) -> Response {
    let event_id = event_id.map(|id| id.as_str()).unwrap_or_default();
    let body = match message {
        Some(message) => json!({"error": error, "message": message, "event_id": event_id}),
        None => json!({"error": error, "event_id": event_id}),
    };
    (status, Json(body)).into_response()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "Request handler panicked");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None, None)
}

async fn handle_request(State(state): State<Arc<GatewayState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    let Some(route) = state.routes.resolve(&path) else {
        debug!(path = %path, "No route for request");
        return error_body(StatusCode::NOT_FOUND, "not_found", None, None);
    };
    if !route.methods.allows(parts.method.as_str()) {
        debug!(path = %path, method = %parts.method, "Method not allowed on route");
        return error_body(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", None, None);
    }

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path, limit = state.max_body_bytes, error = %e, "Rejected request body");
            return error_body(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", None, None);
        }
    };

    let query = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let inbound = InboundRequest {
        method: parts.method,
        path,
        query,
        headers: parts.headers,
        body,
        remote_addr,
    };

    let outcome = state
        .ingress
        .handle(route, state.authenticator.as_ref(), inbound)
        .await;
    render(outcome)
}

fn render(outcome: IngressOutcome) -> Response {
    match outcome {
        IngressOutcome::Unauthorized { reason } => error_body(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            Some(&reason.to_string()),
            None,
        ),
        IngressOutcome::Accepted { event_id } => (
            StatusCode::ACCEPTED,
            Json(json!({"accepted": true, "event_id": event_id.as_str(), "forwarded": true})),
        )
            .into_response(),
        IngressOutcome::Saturated { event_id } => error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            Some("Event channel blocked"),
            Some(&event_id),
        ),
        IngressOutcome::TimedOut { event_id } => error_body(
            StatusCode::GATEWAY_TIMEOUT,
            "gateway_timeout",
            Some("Workflow execution timed out"),
            Some(&event_id),
        ),
        IngressOutcome::Responded { event_id, response } => render_workflow_response(&event_id, response),
    }
}

fn render_workflow_response(event_id: &EventId, response: WorkflowResponse) -> Response {
    let mut rendered = match &response.error {
        Some(message) => error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "workflow_error",
            Some(message),
            Some(event_id),
        ),
        None => {
            let status = StatusCode::from_u16(response.effective_status()).unwrap_or_else(|_| {
                warn!(event_id = %event_id, status = response.effective_status(), "Invalid workflow status code");
                StatusCode::from_u16(DEFAULT_STATUS_CODE).unwrap_or(StatusCode::OK)
            });
            let body = response
                .body
                .clone()
                .unwrap_or_else(|| json!({"success": true, "event_id": event_id.as_str()}));
            (status, Json(body)).into_response()
        }
    };

    apply_headers(event_id, rendered.headers_mut(), &response);
    rendered
}

/// Delivered headers win over the JSON content type set by the renderer.
fn apply_headers(event_id: &EventId, target: &mut HeaderMap, response: &WorkflowResponse) {
    for (name, value) in &response.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                target.insert(name, value);
            }
            _ => warn!(event_id = %event_id, header = %name, "Skipping invalid workflow response header"),
        }
    }
}

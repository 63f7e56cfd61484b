// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Gateway Plugin
//!
//! Binds the HTTP gateway to the node plugin RPC contract. Workers call
//! `SubscribeTrigger` to receive inbound HTTP requests as trigger events and
//! `DeliverResponse` to answer requests waiting in sync mode.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** [`PluginHandler`] implementation over the event bus,
//!   correlation manager and listener supervisor

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowgate_plugin_sdk::proto::{
    self, DeliverResponseRequest, DeliverResponseResponse, GetMetadataResponse, HealthCheckRequest,
    HealthCheckResponse, HealthStatus, NodeCategory, NodeType, ParameterDef, ParameterType,
    PluginCapabilities, RunRequest, RunResponse, StopRequest, StopResponse, StopStatus,
    SubscribeTriggerRequest,
};
use flowgate_plugin_sdk::{PluginHandler, StreamSender};
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info, warn};

use crate::application::ingress::IngressService;
use crate::domain::event::{EventId, TriggerEvent};
use crate::domain::gateway_config::{filter_keys, ServerConfig, DEFAULT_HTTP_PORT, DEFAULT_MAX_BODY_BYTES};
use crate::domain::node_config::GatewayNodeConfig;
use crate::domain::response::WorkflowResponse;
use crate::domain::route::DEFAULT_SYNC_TIMEOUT_MS;
use crate::infrastructure::correlation::ResponseCorrelationManager;
use crate::infrastructure::event_bus::{EventBusConfig, EventManager};
use crate::presentation::listener::HttpListener;

pub const PLUGIN_NAME: &str = "http_gateway";
pub const PLUGIN_DISPLAY_NAME: &str = "HTTP Gateway";
pub const PLUGIN_ICON: &str = "Globe";

pub struct GatewayPlugin {
    events: Arc<EventManager>,
    responses: Arc<ResponseCorrelationManager>,
    listener: Arc<HttpListener>,
    background: CancellationToken,
}

impl GatewayPlugin {
    /// Build the plugin and start its background tasks. Requires a Tokio runtime.
    pub fn new(bus: EventBusConfig, sweep_interval: Option<Duration>) -> Self {
        let events = Arc::new(EventManager::new(bus));
        let responses = Arc::new(ResponseCorrelationManager::new());
        let listener = Arc::new(HttpListener::new(IngressService::new(
            events.clone(),
            responses.clone(),
        )));

        let background = CancellationToken::new();
        if let Some(interval) = sweep_interval {
            responses.spawn_sweeper(interval, background.child_token());
        }

        Self {
            events,
            responses,
            listener,
            background,
        }
    }

    pub fn from_config(config: &GatewayNodeConfig) -> Self {
        Self::new(
            EventBusConfig::from(&config.event_bus),
            config.correlation.sweep_interval(),
        )
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn responses(&self) -> &Arc<ResponseCorrelationManager> {
        &self.responses
    }

    pub fn listener(&self) -> &Arc<HttpListener> {
        &self.listener
    }

    /// Parse `filters` and make sure the HTTP listener is serving them.
    pub async fn start_listener(&self, filters: &HashMap<String, String>) -> Result<SocketAddr, Status> {
        let config = ServerConfig::from_filters(filters)
            .map_err(|e| Status::invalid_argument(format!("invalid gateway filters: {e}")))?;

        self.listener
            .ensure(config)
            .await
            .map_err(|e| Status::unavailable(e.to_string()))
    }

    /// Stop the listener, drain the bus and end background tasks.
    pub async fn shutdown(&self) {
        self.listener.stop().await;
        self.events.shutdown().await;
        self.background.cancel();
    }
}

impl Drop for GatewayPlugin {
    fn drop(&mut self) {
        self.background.cancel();
    }
}

fn to_proto_event(event: &TriggerEvent) -> proto::TriggerEvent {
    proto::TriggerEvent {
        event_id: event.event_id().to_string(),
        source: event.source().to_string(),
        payload: Some(proto::Value::from_json(event.payload())),
        timestamp_ms: event.timestamp_ms(),
        target_workflow: event.target_workflow().to_string(),
    }
}

fn to_workflow_response(request: DeliverResponseRequest) -> WorkflowResponse {
    let body = if request.has_response {
        request.body.as_ref().map(proto::Value::to_json)
    } else {
        None
    };

    WorkflowResponse {
        body,
        status_code: u16::try_from(request.status_code).ok().filter(|code| *code > 0),
        headers: request.headers,
        error: (!request.error.is_empty()).then_some(request.error),
    }
}

fn param(name: &str, display_name: &str, description: &str, kind: ParameterType) -> ParameterDef {
    ParameterDef {
        name: name.to_string(),
        display_name: display_name.to_string(),
        description: description.to_string(),
        r#type: kind as i32,
        required: false,
        default_value: None,
    }
}

fn input_parameters() -> Vec<ParameterDef> {
    let mut http_port = param(
        filter_keys::HTTP_PORT,
        "HTTP Port",
        "Port to listen on, 0 for an ephemeral port",
        ParameterType::Number,
    );
    http_port.default_value = Some(proto::Value::from_json(&serde_json::json!(DEFAULT_HTTP_PORT)));

    let mut max_body = param(
        filter_keys::MAX_BODY_BYTES,
        "Max Body Bytes",
        "Largest accepted request body",
        ParameterType::Number,
    );
    max_body.default_value = Some(proto::Value::from_json(&serde_json::json!(DEFAULT_MAX_BODY_BYTES)));

    vec![
        param(
            filter_keys::ROUTES_JSON,
            "Routes (JSON)",
            "JSON array of {path, methods, target_workflow, sync_response, response_timeout_ms}",
            ParameterType::Json,
        ),
        param(
            filter_keys::ROUTES,
            "Routes",
            "Comma-separated METHOD:/path entries, or a JSON route list",
            ParameterType::String,
        ),
        param(
            filter_keys::TARGET_WORKFLOW,
            "Target Workflow",
            "Workflow for routes that do not name one",
            ParameterType::String,
        ),
        param(filter_keys::HTTP_HOST, "HTTP Host", "Address to bind", ParameterType::String),
        http_port,
        max_body,
        param(
            filter_keys::API_KEY,
            "API Key",
            "Require X-API-Key or a Bearer token",
            ParameterType::Secret,
        ),
        param(
            filter_keys::HMAC_SECRET,
            "HMAC Secret",
            "Require an HMAC-SHA256 request signature",
            ParameterType::Secret,
        ),
        param(
            filter_keys::SIGNATURE_HEADER,
            "Signature Header",
            "Header carrying the hex signature",
            ParameterType::String,
        ),
        param(
            filter_keys::TIMESTAMP_HEADER,
            "Timestamp Header",
            "Header carrying the epoch-millisecond timestamp",
            ParameterType::String,
        ),
        param(
            filter_keys::TIMESTAMP_SKEW_MS,
            "Timestamp Skew (ms)",
            "Accepted clock skew for signed requests",
            ParameterType::Number,
        ),
    ]
}

fn output_parameters() -> Vec<ParameterDef> {
    vec![
        param("method", "Method", "HTTP method", ParameterType::String),
        param("path", "Path", "Request path", ParameterType::String),
        param("headers", "Headers", "Request headers", ParameterType::Json),
        param("query", "Query", "Query parameters", ParameterType::Json),
        param("body", "Body", "Decoded request body", ParameterType::Json),
        param("raw_body", "Raw Body", "Request body as text", ParameterType::String),
        param("remote_addr", "Remote Address", "Client ip:port", ParameterType::String),
    ]
}

#[async_trait]
impl PluginHandler for GatewayPlugin {
    async fn get_metadata(&self) -> Result<GetMetadataResponse, Status> {
        Ok(GetMetadataResponse {
            name: PLUGIN_NAME.to_string(),
            display_name: PLUGIN_DISPLAY_NAME.to_string(),
            description: "Receives HTTP requests and emits them as workflow trigger events".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            icon: PLUGIN_ICON.to_string(),
            category: NodeCategory::Trigger as i32,
            node_type: NodeType::Trigger as i32,
            credential_type: String::new(),
            input_parameters: input_parameters(),
            output_parameters: output_parameters(),
            capabilities: Some(PluginCapabilities {
                supports_streaming: true,
                supports_cancel: true,
                requires_credential: false,
                max_concurrent: 0,
                default_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS as i64,
            }),
        })
    }

    /// Triggers act on inbound requests, not on `Run`.
    async fn run(&self, _request: RunRequest, _stream: StreamSender<RunResponse>) -> Result<(), Status> {
        debug!("Run called on trigger plugin, nothing to do");
        Ok(())
    }

    async fn stop(&self, _request: StopRequest) -> Result<StopResponse, Status> {
        self.listener.stop().await;
        Ok(StopResponse {
            success: true,
            status: StopStatus::Stopped as i32,
            message: "HTTP listener stopped".to_string(),
        })
    }

    async fn health_check(&self, _request: HealthCheckRequest) -> Result<HealthCheckResponse, Status> {
        let status = self.listener.status();

        let mut details = HashMap::new();
        details.insert("listener_state".to_string(), status.state.to_string());
        details.insert(
            "listener_addr".to_string(),
            status.addr.map(|a| a.to_string()).unwrap_or_default(),
        );
        details.insert("subscribers".to_string(), self.events.subscriber_count().to_string());
        details.insert(
            "pending_responses".to_string(),
            self.responses.pending_count().to_string(),
        );

        let (health, message) = if status.is_degraded() {
            (HealthStatus::Degraded, format!("HTTP listener is {}", status.state))
        } else {
            (HealthStatus::Healthy, "OK".to_string())
        };

        Ok(HealthCheckResponse {
            status: health as i32,
            message,
            details,
        })
    }

    async fn subscribe_trigger(
        &self,
        request: SubscribeTriggerRequest,
        stream: StreamSender<proto::TriggerEvent>,
    ) -> Result<(), Status> {
        // Subscribe before the listener is up so no accepted request is missed
        let mut subscription = self.events.subscribe();
        let addr = self.start_listener(&request.filters).await?;

        info!(
            subscriber = subscription.id(),
            consumer_group = %request.consumer_group,
            addr = %addr,
            "Trigger subscription opened"
        );

        loop {
            tokio::select! {
                _ = stream.cancelled() => {
                    debug!(subscriber = subscription.id(), "Trigger subscription cancelled");
                    break;
                }
                event = subscription.recv() => {
                    let Some(event) = event else {
                        info!(subscriber = subscription.id(), "Event bus closed, ending trigger subscription");
                        break;
                    };
                    if stream.send(to_proto_event(&event)).await.is_err() {
                        warn!(
                            subscriber = subscription.id(),
                            event_id = %event.event_id(),
                            "Trigger stream closed while sending"
                        );
                        return Err(Status::unavailable("trigger stream closed"));
                    }
                }
            }
        }

        subscription.close();
        Ok(())
    }

    async fn deliver_response(&self, request: DeliverResponseRequest) -> Result<DeliverResponseResponse, Status> {
        let event_id = EventId::from_string(request.event_id.clone());
        match self.responses.deliver(&event_id, to_workflow_response(request)) {
            Ok(()) => Ok(DeliverResponseResponse {
                success: true,
                error: String::new(),
            }),
            Err(e) => Ok(DeliverResponseResponse {
                success: false,
                error: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auth::API_KEY_HEADER;
    use serde_json::json;

    fn plugin() -> Arc<GatewayPlugin> {
        Arc::new(GatewayPlugin::new(EventBusConfig::default(), None))
    }

    fn loopback_filters(extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut filters = HashMap::from([
            (filter_keys::HTTP_HOST.to_string(), "127.0.0.1".to_string()),
            (filter_keys::HTTP_PORT.to_string(), "0".to_string()),
        ]);
        for (k, v) in extra {
            filters.insert(k.to_string(), v.to_string());
        }
        filters
    }

    async fn wait_for_listener(plugin: &GatewayPlugin) -> SocketAddr {
        for _ in 0..100 {
            if let Some(addr) = plugin.listener().local_addr() {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("listener did not start");
    }

    #[tokio::test]
    async fn test_metadata() {
        let metadata = plugin().get_metadata().await.unwrap();
        assert_eq!(metadata.name, "http_gateway");
        assert_eq!(metadata.display_name, "HTTP Gateway");
        assert_eq!(metadata.icon, "Globe");
        assert_eq!(metadata.category(), NodeCategory::Trigger);
        assert_eq!(metadata.node_type(), NodeType::Trigger);
        assert_eq!(metadata.version, env!("CARGO_PKG_VERSION"));

        let caps = metadata.capabilities.unwrap();
        assert!(caps.supports_streaming);
        assert!(!caps.requires_credential);
        assert_eq!(caps.default_timeout_ms, 30_000);
        assert!(metadata
            .input_parameters
            .iter()
            .any(|p| p.name == filter_keys::ROUTES_JSON));
    }

    #[test]
    fn test_delivered_response_conversion() {
        let request = DeliverResponseRequest {
            event_id: "e-1".into(),
            body: Some(proto::Value::from_json(&json!({"ok": true}))),
            status_code: 0,
            headers: HashMap::from([("X-Id".to_string(), "1".to_string())]),
            error: String::new(),
            has_response: true,
        };
        let response = to_workflow_response(request);
        assert_eq!(response.body, Some(json!({"ok": true})));
        assert_eq!(response.status_code, None);
        assert_eq!(response.error, None);
        assert_eq!(response.headers["X-Id"], "1");

        let request = DeliverResponseRequest {
            body: Some(proto::Value::from_json(&json!("ignored"))),
            status_code: -5,
            error: "boom".into(),
            has_response: false,
            ..Default::default()
        };
        let response = to_workflow_response(request);
        assert_eq!(response.body, None);
        assert_eq!(response.status_code, None);
        assert_eq!(response.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_deliver_without_pending_request_fails() {
        let result = plugin()
            .deliver_response(DeliverResponseRequest {
                event_id: "unknown".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error, "no pending request for event: unknown");
    }

    #[tokio::test]
    async fn test_invalid_filters_are_rejected() {
        let plugin = plugin();
        let (sender, _rx) = StreamSender::channel(4);
        let request = SubscribeTriggerRequest {
            filters: HashMap::from([(filter_keys::ROUTES_JSON.to_string(), "[not json".to_string())]),
            consumer_group: String::new(),
        };

        let err = plugin.subscribe_trigger(request, sender).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
        assert_eq!(plugin.events().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_streams_http_requests() {
        let plugin = plugin();
        let (sender, mut rx) = StreamSender::channel(4);
        let request = SubscribeTriggerRequest {
            filters: loopback_filters(&[
                (filter_keys::API_KEY, "k1"),
                (filter_keys::TARGET_WORKFLOW, "orders"),
            ]),
            consumer_group: "workers".into(),
        };

        let task = tokio::spawn({
            let plugin = plugin.clone();
            async move { plugin.subscribe_trigger(request, sender).await }
        });
        let addr = wait_for_listener(&plugin).await;

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/webhook"))
            .header(API_KEY_HEADER, "k1")
            .json(&json!({"order": 7}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);
        let accepted: serde_json::Value = response.json().await.unwrap();

        let event = rx.recv().await.unwrap().unwrap();
        assert_eq!(accepted["event_id"], event.event_id.as_str());
        assert_eq!(event.source, "POST /webhook");
        assert_eq!(event.target_workflow, "orders");
        let payload = event.payload.unwrap().to_json();
        assert_eq!(payload["body"], json!({"order": 7}));
        assert_eq!(payload["headers"]["X-API-Key"], "k1");
        assert!(payload["remote_addr"].as_str().unwrap().starts_with("127.0.0.1:"));

        drop(rx);
        assert!(task.await.unwrap().is_ok());
        plugin.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_reports_listener() {
        let plugin = plugin();
        let health = plugin.health_check(HealthCheckRequest::default()).await.unwrap();
        assert_eq!(health.status(), HealthStatus::Healthy);
        assert_eq!(health.details["listener_state"], "stopped");
        assert_eq!(health.details["subscribers"], "0");

        plugin.start_listener(&loopback_filters(&[])).await.unwrap();
        let health = plugin.health_check(HealthCheckRequest::default()).await.unwrap();
        assert_eq!(health.status(), HealthStatus::Healthy);
        assert_eq!(health.details["listener_state"], "running");
        assert!(!health.details["listener_addr"].is_empty());
        assert_eq!(health.details["pending_responses"], "0");

        plugin.stop(StopRequest::default()).await.unwrap();
        assert_eq!(plugin.listener().local_addr(), None);
    }

    #[tokio::test]
    async fn test_bind_failure_degrades_health() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port().to_string();
        let plugin = plugin();

        let err = plugin
            .start_listener(&loopback_filters(&[(filter_keys::HTTP_PORT, port.as_str())]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unavailable);

        let health = plugin.health_check(HealthCheckRequest::default()).await.unwrap();
        assert_eq!(health.status(), HealthStatus::Degraded);
    }
}

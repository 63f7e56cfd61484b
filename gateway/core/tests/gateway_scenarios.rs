// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end scenarios: HTTP clients on one side, plugin RPC workers on the
//! other, everything over loopback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flowgate_gateway_core::domain::gateway_config::filter_keys;
use flowgate_gateway_core::infrastructure::auth::sign_request;
use flowgate_gateway_core::GatewayPlugin;
use flowgate_gateway_core::infrastructure::event_bus::EventBusConfig;
use flowgate_plugin_sdk::proto::node_plugin_service_client::NodePluginServiceClient;
use flowgate_plugin_sdk::proto::{
    DeliverResponseRequest, HealthCheckRequest, SubscribeTriggerRequest, TriggerEvent, Value,
};
use flowgate_plugin_sdk::serve_listener;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Channel;
use tonic::Streaming;

type Client = NodePluginServiceClient<Channel>;

struct Gateway {
    client: Client,
    _stop: oneshot::Sender<()>,
}

async fn start_gateway() -> Gateway {
    let plugin = Arc::new(GatewayPlugin::new(EventBusConfig::default(), None));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    tokio::spawn(serve_listener(plugin, listener, async move {
        let _ = stop_rx.await;
    }));

    let client = NodePluginServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap();
    Gateway {
        client,
        _stop: stop_tx,
    }
}

fn filters(extra: &[(&str, &str)]) -> HashMap<String, String> {
    let mut filters = HashMap::from([
        (filter_keys::HTTP_HOST.to_string(), "127.0.0.1".to_string()),
        (filter_keys::HTTP_PORT.to_string(), "0".to_string()),
        (filter_keys::TARGET_WORKFLOW.to_string(), "orders".to_string()),
    ]);
    for (k, v) in extra {
        filters.insert(k.to_string(), v.to_string());
    }
    filters
}

async fn subscribe(client: &mut Client, filters: HashMap<String, String>) -> Streaming<TriggerEvent> {
    client
        .subscribe_trigger(SubscribeTriggerRequest {
            filters,
            consumer_group: "workers".into(),
        })
        .await
        .unwrap()
        .into_inner()
}

/// Poll health until the listener reports an address and `subscribers` subscriptions.
async fn listener_url(client: &mut Client, subscribers: usize) -> String {
    for _ in 0..200 {
        let health = client
            .health_check(HealthCheckRequest::default())
            .await
            .unwrap()
            .into_inner();
        let addr = health.details.get("listener_addr").cloned().unwrap_or_default();
        let count: usize = health
            .details
            .get("subscribers")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        if !addr.is_empty() && count >= subscribers {
            return format!("http://{addr}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("gateway listener never came up");
}

async fn next_event(stream: &mut Streaming<TriggerEvent>) -> TriggerEvent {
    tokio::time::timeout(Duration::from_secs(5), stream.message())
        .await
        .expect("no event within 5s")
        .unwrap()
        .expect("stream ended")
}

#[tokio::test]
async fn async_request_is_accepted_and_streamed() {
    let mut gw = start_gateway().await;
    let mut events = subscribe(&mut gw.client, filters(&[])).await;
    let base = listener_url(&mut gw.client, 1).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/webhook?tag=a&tag=b"))
        .header("X-Trace", "t-1")
        .json(&json!({"order": 7}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["accepted"], true);

    let event = next_event(&mut events).await;
    assert_eq!(body["event_id"], event.event_id.as_str());
    assert_eq!(event.target_workflow, "orders");

    let payload = event.payload.unwrap().to_json();
    assert_eq!(payload["method"], "POST");
    assert_eq!(payload["query"]["tag"], json!(["a", "b"]));
    assert_eq!(payload["headers"]["X-Trace"], "t-1");
    assert_eq!(payload["body"], json!({"order": 7}));
}

#[tokio::test]
async fn sync_request_round_trips_through_worker() {
    let mut gw = start_gateway().await;
    let routes = r#"[{"path":"/api/v1/orders","methods":["POST"],"sync_response":true,"response_timeout_ms":5000}]"#;
    let mut events = subscribe(&mut gw.client, filters(&[(filter_keys::ROUTES_JSON, routes)])).await;
    let base = listener_url(&mut gw.client, 1).await;

    let mut worker_client = gw.client.clone();
    let worker = tokio::spawn(async move {
        let event = next_event(&mut events).await;
        let ack = worker_client
            .deliver_response(DeliverResponseRequest {
                event_id: event.event_id.clone(),
                body: Some(Value::from_json(&json!({"id": 42}))),
                status_code: 201,
                headers: HashMap::from([("X-Order-Id".to_string(), "42".to_string())]),
                error: String::new(),
                has_response: true,
            })
            .await
            .unwrap()
            .into_inner();
        assert!(ack.success);

        // A second delivery for the same event has nobody waiting
        let again = worker_client
            .deliver_response(DeliverResponseRequest {
                event_id: event.event_id,
                has_response: true,
                ..Default::default()
            })
            .await
            .unwrap()
            .into_inner();
        assert!(!again.success);
    });

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/orders"))
        .json(&json!({"sku": "A-1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(response.headers()["x-order-id"], "42");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": 42}));
    worker.await.unwrap();
}

#[tokio::test]
async fn sync_request_times_out_and_late_delivery_fails() {
    let mut gw = start_gateway().await;
    let mut events = subscribe(&mut gw.client, filters(&[])).await;
    let base = listener_url(&mut gw.client, 1).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/webhook"))
        .header("X-Sync-Response", "true")
        .header("X-Response-Timeout-Ms", "100")
        .body("ping")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 504);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "gateway_timeout");

    let event = next_event(&mut events).await;
    assert_eq!(body["event_id"], event.event_id.as_str());

    let late = gw
        .client
        .deliver_response(DeliverResponseRequest {
            event_id: event.event_id,
            has_response: true,
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!late.success);
    assert!(late.error.contains("no pending request"));
}

#[tokio::test]
async fn hmac_signed_requests_are_verified() {
    let mut gw = start_gateway().await;
    let mut events = subscribe(&mut gw.client, filters(&[(filter_keys::HMAC_SECRET, "s3cret")])).await;
    let base = listener_url(&mut gw.client, 1).await;
    let http = reqwest::Client::new();

    let body = br#"{"signed":true}"#;
    let timestamp = chrono::Utc::now().timestamp_millis().to_string();
    let signature = sign_request("s3cret", "POST", "/webhook", &timestamp, body).unwrap();

    let accepted = http
        .post(format!("{base}/webhook"))
        .header("X-Timestamp", &timestamp)
        .header("X-Signature", &signature)
        .header("Content-Type", "application/json")
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 202);
    assert_eq!(next_event(&mut events).await.payload.unwrap().to_json()["body"]["signed"], true);

    let rejected = http
        .post(format!("{base}/webhook"))
        .header("X-Timestamp", &timestamp)
        .header("X-Signature", "00".repeat(32))
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 401);
    let error: serde_json::Value = rejected.json().await.unwrap();
    assert_eq!(error["message"], "invalid signature");

    let unsigned = http.post(format!("{base}/webhook")).send().await.unwrap();
    assert_eq!(unsigned.status(), 401);
}

#[tokio::test]
async fn every_subscriber_receives_every_event() {
    let mut gw = start_gateway().await;
    let mut first = subscribe(&mut gw.client, filters(&[])).await;
    let mut second = subscribe(&mut gw.client, filters(&[])).await;
    let base = listener_url(&mut gw.client, 2).await;

    let response = reqwest::Client::new()
        .get(format!("{base}/webhook"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let a = next_event(&mut first).await;
    let b = next_event(&mut second).await;
    assert_eq!(a.event_id, b.event_id);
}

#[tokio::test]
async fn resubscribing_with_same_filters_keeps_listener() {
    let mut gw = start_gateway().await;
    let _first = subscribe(&mut gw.client, filters(&[])).await;
    let before = listener_url(&mut gw.client, 1).await;

    let _second = subscribe(&mut gw.client, filters(&[])).await;
    let after = listener_url(&mut gw.client, 2).await;
    assert_eq!(before, after);

    let _third = subscribe(&mut gw.client, filters(&[(filter_keys::TARGET_WORKFLOW, "billing")])).await;
    let mut moved = after.clone();
    for _ in 0..200 {
        moved = listener_url(&mut gw.client, 3).await;
        if moved != after {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_ne!(moved, after);

    let status = reqwest::get(format!("{moved}/nope")).await.unwrap().status();
    assert_eq!(status, 404);
}

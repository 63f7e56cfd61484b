// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Plugin Handler Contract
//!
//! Every node plugin implements [`PluginHandler`]. Only
//! [`PluginHandler::get_metadata`] is required; the remaining operations
//! fall back to the defaults below so a plugin overrides just what it needs.
//!
//! | Operation          | Default                                        |
//! |--------------------|------------------------------------------------|
//! | `init`             | success                                        |
//! | `stop`             | success, `STOPPED`                             |
//! | `health_check`     | `HEALTHY` / "OK"                               |
//! | `test_credential`  | success, no check performed                    |
//! | `run`              | `UNIMPLEMENTED`                                |
//! | `subscribe_trigger`| `UNIMPLEMENTED`                                |
//! | `deliver_response` | `success = false`                              |
//!
//! Streaming operations receive a [`StreamSender`]. Returning `Ok(())` ends
//! the stream normally; returning `Err(status)` sends the status as the final
//! item.
//!
//! # Architecture
//!
//! - **Layer:** Interface
//! - **Purpose:** Transport-independent plugin contract

use std::collections::HashMap;

use async_trait::async_trait;
use tonic::Status;

use crate::proto::{
    DeliverResponseRequest, DeliverResponseResponse, GetMetadataResponse, HealthCheckRequest,
    HealthCheckResponse, HealthStatus, InitRequest, InitResponse, RunRequest, RunResponse,
    StopRequest, StopResponse, StopStatus, SubscribeTriggerRequest, TestCredentialRequest,
    TestCredentialResponse, TriggerEvent,
};
use crate::stream::StreamSender;

#[async_trait]
pub trait PluginHandler: Send + Sync + 'static {
    /// Capability descriptor advertised to the workflow server.
    async fn get_metadata(&self) -> Result<GetMetadataResponse, Status>;

    async fn init(&self, _request: InitRequest) -> Result<InitResponse, Status> {
        Ok(InitResponse {
            success: true,
            error: String::new(),
        })
    }

    async fn run(
        &self,
        _request: RunRequest,
        _stream: StreamSender<RunResponse>,
    ) -> Result<(), Status> {
        Err(Status::unimplemented("run is not implemented by this plugin"))
    }

    async fn stop(&self, _request: StopRequest) -> Result<StopResponse, Status> {
        Ok(StopResponse {
            success: true,
            status: StopStatus::Stopped as i32,
            message: "stopped".to_string(),
        })
    }

    async fn health_check(
        &self,
        _request: HealthCheckRequest,
    ) -> Result<HealthCheckResponse, Status> {
        Ok(HealthCheckResponse {
            status: HealthStatus::Healthy as i32,
            message: "OK".to_string(),
            details: HashMap::new(),
        })
    }

    async fn test_credential(
        &self,
        _request: TestCredentialRequest,
    ) -> Result<TestCredentialResponse, Status> {
        let mut info = HashMap::new();
        info.insert(
            "message".to_string(),
            "No credential check implemented".to_string(),
        );
        Ok(TestCredentialResponse {
            success: true,
            error: String::new(),
            info,
        })
    }

    async fn subscribe_trigger(
        &self,
        _request: SubscribeTriggerRequest,
        _stream: StreamSender<TriggerEvent>,
    ) -> Result<(), Status> {
        Err(Status::unimplemented(
            "subscribe_trigger is not implemented by this plugin",
        ))
    }

    async fn deliver_response(
        &self,
        _request: DeliverResponseRequest,
    ) -> Result<DeliverResponseResponse, Status> {
        Ok(DeliverResponseResponse {
            success: false,
            error: "plugin does not accept responses".to_string(),
        })
    }
}

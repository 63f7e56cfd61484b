// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! gRPC server adapter
//!
//! Binds a [`PluginHandler`] to the generated `NodePluginService` trait.
//! Every RPC is logged with its duration; streaming RPCs run the handler on
//! a dedicated task feeding a bounded channel.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::handler::PluginHandler;
use crate::lifecycle::Lifecycle;
use crate::proto::node_plugin_service_server::{NodePluginService, NodePluginServiceServer};
use crate::proto::*;
use crate::registration::{self, RegistrationConfig};
use crate::stream::StreamSender;

/// Capacity of the per-RPC channel backing server streams.
pub const STREAM_CAPACITY: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("failed to read plugin metadata: {0}")]
    Metadata(Status),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// `NodePluginService` implementation wrapping a plugin handler.
pub struct PluginServer<H> {
    handler: Arc<H>,
    lifecycle: Lifecycle,
}

impl<H: PluginHandler> PluginServer<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn into_server(self) -> NodePluginServiceServer<Self> {
        NodePluginServiceServer::new(self)
    }

    fn open_stream<Req, Item, F, Fut>(
        &self,
        rpc: &'static str,
        request: Req,
        call: F,
    ) -> Result<ReceiverStream<Result<Item, Status>>, Status>
    where
        Req: Send + 'static,
        Item: Send + 'static,
        F: FnOnce(Arc<H>, Req, StreamSender<Item>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
    {
        let guard = self
            .lifecycle
            .begin_stream()
            .map_err(|e| Status::failed_precondition(e.to_string()))?;

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let sender = StreamSender::new(tx, guard.stop_token());
        let handler = self.handler.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            debug!(rpc, "stream opened");

            match call(handler, request, sender.clone()).await {
                Ok(()) => info!(
                    rpc,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "stream completed"
                ),
                Err(status) => {
                    warn!(
                        rpc,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        code = ?status.code(),
                        error = %status.message(),
                        "stream failed"
                    );
                    sender.fail(status).await;
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}

fn log_unary<T>(rpc: &'static str, started: Instant, result: &Result<T, Status>) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => debug!(rpc, elapsed_ms, "rpc completed"),
        Err(status) => warn!(rpc, elapsed_ms, code = ?status.code(), error = %status.message(), "rpc failed"),
    }
}

#[tonic::async_trait]
impl<H: PluginHandler> NodePluginService for PluginServer<H> {
    type RunStream = ReceiverStream<Result<RunResponse, Status>>;
    type SubscribeTriggerStream = ReceiverStream<Result<TriggerEvent, Status>>;

    async fn get_metadata(
        &self,
        _request: Request<GetMetadataRequest>,
    ) -> Result<Response<GetMetadataResponse>, Status> {
        let started = Instant::now();
        let result = self.handler.get_metadata().await;
        log_unary("get_metadata", started, &result);
        result.map(Response::new)
    }

    async fn init(&self, request: Request<InitRequest>) -> Result<Response<InitResponse>, Status> {
        let started = Instant::now();
        let result = self.handler.init(request.into_inner()).await;
        if matches!(&result, Ok(resp) if resp.success) {
            self.lifecycle.initialize();
        }
        log_unary("init", started, &result);
        result.map(Response::new)
    }

    async fn run(
        &self,
        request: Request<RunRequest>,
    ) -> Result<Response<Self::RunStream>, Status> {
        let stream = self.open_stream("run", request.into_inner(), |handler, req, sender| async move {
            handler.run(req, sender).await
        })?;
        Ok(Response::new(stream))
    }

    async fn stop(&self, request: Request<StopRequest>) -> Result<Response<StopResponse>, Status> {
        let started = Instant::now();
        let result = self.handler.stop(request.into_inner()).await;
        self.lifecycle.stop();
        log_unary("stop", started, &result);
        result.map(Response::new)
    }

    async fn health_check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let started = Instant::now();
        let result = self
            .handler
            .health_check(request.into_inner())
            .await
            .map(|mut resp| {
                resp.details
                    .entry("lifecycle_state".to_string())
                    .or_insert_with(|| self.lifecycle.state().to_string());
                resp.details
                    .entry("active_streams".to_string())
                    .or_insert_with(|| self.lifecycle.active_streams().to_string());
                resp
            });
        log_unary("health_check", started, &result);
        result.map(Response::new)
    }

    async fn test_credential(
        &self,
        request: Request<TestCredentialRequest>,
    ) -> Result<Response<TestCredentialResponse>, Status> {
        let started = Instant::now();
        let result = self.handler.test_credential(request.into_inner()).await;
        log_unary("test_credential", started, &result);
        result.map(Response::new)
    }

    async fn subscribe_trigger(
        &self,
        request: Request<SubscribeTriggerRequest>,
    ) -> Result<Response<Self::SubscribeTriggerStream>, Status> {
        let stream = self.open_stream(
            "subscribe_trigger",
            request.into_inner(),
            |handler, req, sender| async move { handler.subscribe_trigger(req, sender).await },
        )?;
        Ok(Response::new(stream))
    }

    async fn deliver_response(
        &self,
        request: Request<DeliverResponseRequest>,
    ) -> Result<Response<DeliverResponseResponse>, Status> {
        let started = Instant::now();
        let result = self.handler.deliver_response(request.into_inner()).await;
        log_unary("deliver_response", started, &result);
        result.map(Response::new)
    }
}

/// Options for [`serve`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub addr: SocketAddr,
    pub registration: Option<RegistrationConfig>,
}

impl ServeOptions {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            registration: None,
        }
    }

    pub fn with_registration(mut self, registration: RegistrationConfig) -> Self {
        self.registration = Some(registration);
        self
    }
}

/// Serve a plugin until `shutdown` resolves.
///
/// When registration is configured the manifest is posted in the background;
/// serving never waits on it.
pub async fn serve<H, F>(handler: Arc<H>, options: ServeOptions, shutdown: F) -> Result<(), ServeError>
where
    H: PluginHandler,
    F: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind(options.addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: options.addr,
            source,
        })?;

    if let Some(registration) = options.registration {
        let metadata = handler
            .get_metadata()
            .await
            .map_err(ServeError::Metadata)?;
        tokio::spawn(async move {
            // Failures are logged inside; a plugin keeps serving unregistered
            let _ = registration::register_with_retry(&registration, &metadata).await;
        });
    }

    serve_listener(handler, listener, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve_listener<H, F>(
    handler: Arc<H>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), ServeError>
where
    H: PluginHandler,
    F: Future<Output = ()> + Send,
{
    let addr = listener.local_addr().ok();
    info!(addr = ?addr, "Starting plugin gRPC server");

    tonic::transport::Server::builder()
        .add_service(PluginServer::new(handler).into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    info!("Plugin gRPC server stopped");
    Ok(())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # HTTP Listener Supervisor
//!
//! Owns the lifecycle of the front-door server. Repeated `SubscribeTrigger`
//! calls all funnel into [`HttpListener::ensure`], which is idempotent for an
//! unchanged [`ServerConfig`] and restarts the server when it changes.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Bind, serve, drain and restart the axum server
//!
//! ```text
//! Stopped ──ensure──▶ Starting ──bind ok──▶ Running
//!    ▲                    │                    │
//!    └────bind failed─────┘◀──stop / replace───┘
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ingress::IngressService;
use crate::domain::gateway_config::ServerConfig;
use crate::presentation::api;

/// How long a replaced or stopped server may drain before it is aborted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Consecutive automatic restarts allowed for one configuration.
pub const MAX_AUTO_RESTARTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Starting,
    Running,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Stopped => write!(f, "stopped"),
            ListenerState::Starting => write!(f, "starting"),
            ListenerState::Running => write!(f, "running"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP listener exited {restarts} times in a row, not restarting until configuration changes")]
    RestartLimit { restarts: u32 },
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStatus {
    pub state: ListenerState,
    pub addr: Option<SocketAddr>,
    /// Whether a listener has been asked for since the last stop
    pub requested: bool,
}

impl ListenerStatus {
    pub fn is_degraded(&self) -> bool {
        self.requested && self.state != ListenerState::Running
    }
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    state: ListenerState,
    addr: Option<SocketAddr>,
}

struct RunningServer {
    config: ServerConfig,
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Supervisor {
    running: Option<RunningServer>,
    restarts: u32,
}

pub struct HttpListener {
    ingress: IngressService,
    supervisor: tokio::sync::Mutex<Supervisor>,
    snapshot: Arc<Mutex<Snapshot>>,
    requested: AtomicBool,
}

impl HttpListener {
    pub fn new(ingress: IngressService) -> Self {
        Self {
            ingress,
            supervisor: tokio::sync::Mutex::new(Supervisor::default()),
            snapshot: Arc::new(Mutex::new(Snapshot {
                state: ListenerState::Stopped,
                addr: None,
            })),
            requested: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.snapshot.lock().state
    }

    /// Bound address while running. Reports the real port for `http_port=0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.snapshot.lock().addr
    }

    pub fn status(&self) -> ListenerStatus {
        let snapshot = *self.snapshot.lock();
        ListenerStatus {
            state: snapshot.state,
            addr: snapshot.addr,
            requested: self.requested.load(Ordering::Acquire),
        }
    }

    fn publish(&self, state: ListenerState, addr: Option<SocketAddr>) {
        *self.snapshot.lock() = Snapshot { state, addr };
    }

    /// Make sure a server for `config` is running and return its address.
    pub async fn ensure(&self, config: ServerConfig) -> Result<SocketAddr, ListenerError> {
        let mut guard = self.supervisor.lock().await;
        let supervisor = &mut *guard;
        self.requested.store(true, Ordering::Release);

        if let Some(running) = &supervisor.running {
            if running.config == config {
                if !running.handle.is_finished() {
                    debug!(addr = %running.addr, "HTTP listener already running with this configuration");
                    return Ok(running.addr);
                }
                if supervisor.restarts >= MAX_AUTO_RESTARTS {
                    error!(restarts = supervisor.restarts, "HTTP listener restart limit reached");
                    return Err(ListenerError::RestartLimit {
                        restarts: supervisor.restarts,
                    });
                }
                supervisor.restarts += 1;
                warn!(
                    addr = %running.addr,
                    attempt = supervisor.restarts,
                    "HTTP listener exited unexpectedly, restarting"
                );
            } else {
                info!("HTTP listener configuration changed, restarting");
                supervisor.restarts = 0;
            }
        }

        if let Some(old) = supervisor.running.take() {
            drain(old).await;
        }

        self.publish(ListenerState::Starting, None);
        let addr = config.bind_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.publish(ListenerState::Stopped, None);
                error!(addr = %addr, error = %source, "Failed to bind HTTP listener");
                return Err(ListenerError::Bind { addr, source });
            }
        };
        let local_addr = listener.local_addr().map_err(|source| {
            self.publish(ListenerState::Stopped, None);
            ListenerError::Bind {
                addr: addr.clone(),
                source,
            }
        })?;

        let cancel = CancellationToken::new();
        let handle = self.spawn_server(listener, &config, cancel.clone());
        supervisor.running = Some(RunningServer {
            config,
            addr: local_addr,
            cancel,
            handle,
        });
        self.publish(ListenerState::Running, Some(local_addr));

        info!(addr = %local_addr, "HTTP listener running");
        Ok(local_addr)
    }

    fn spawn_server(&self, listener: TcpListener, config: &ServerConfig, cancel: CancellationToken) -> JoinHandle<()> {
        let app = api::app(self.ingress.clone(), config);
        let snapshot = self.snapshot.clone();

        tokio::spawn(async move {
            let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(cancel.clone().cancelled_owned())
                .await;

            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
            if !cancel.is_cancelled() {
                warn!("HTTP server stopped without a shutdown request");
                *snapshot.lock() = Snapshot {
                    state: ListenerState::Stopped,
                    addr: None,
                };
            }
        })
    }

    /// Drain and stop the current server, if any.
    pub async fn stop(&self) {
        let mut supervisor = self.supervisor.lock().await;
        self.requested.store(false, Ordering::Release);
        supervisor.restarts = 0;

        if let Some(running) = supervisor.running.take() {
            drain(running).await;
            info!("HTTP listener stopped");
        }
        self.publish(ListenerState::Stopped, None);
    }
}

async fn drain(server: RunningServer) {
    server.cancel.cancel();
    let mut handle = server.handle;
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
        Ok(_) => debug!(addr = %server.addr, "HTTP server drained"),
        Err(_) => {
            warn!(
                addr = %server.addr,
                grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
                "HTTP server did not drain in time, aborting"
            );
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway_config::filter_keys;
    use crate::infrastructure::correlation::ResponseCorrelationManager;
    use crate::infrastructure::event_bus::EventManager;
    use std::collections::HashMap;

    fn listener() -> HttpListener {
        let ingress = IngressService::new(
            Arc::new(EventManager::with_default_config()),
            Arc::new(ResponseCorrelationManager::new()),
        );
        HttpListener::new(ingress)
    }

    fn config(workflow: &str) -> ServerConfig {
        let filters = HashMap::from([
            (filter_keys::HTTP_HOST.to_string(), "127.0.0.1".to_string()),
            (filter_keys::HTTP_PORT.to_string(), "0".to_string()),
            (filter_keys::TARGET_WORKFLOW.to_string(), workflow.to_string()),
        ]);
        ServerConfig::from_filters(&filters).unwrap()
    }

    async fn kill_server(listener: &HttpListener) {
        if let Some(running) = &listener.supervisor.lock().await.running {
            running.handle.abort();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let listener = listener();
        assert_eq!(listener.state(), ListenerState::Stopped);

        let first = listener.ensure(config("orders")).await.unwrap();
        let second = listener.ensure(config("orders")).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.port(), 0);
        assert_eq!(listener.state(), ListenerState::Running);
        assert_eq!(listener.local_addr(), Some(first));
        listener.stop().await;
    }

    #[tokio::test]
    async fn test_changed_config_restarts() {
        let listener = listener();
        let first = listener.ensure(config("orders")).await.unwrap();
        let second = listener.ensure(config("billing")).await.unwrap();

        assert_ne!(first, second);
        assert!(tokio::net::TcpStream::connect(first).await.is_err());
        assert!(tokio::net::TcpStream::connect(second).await.is_ok());
        listener.stop().await;
    }

    #[tokio::test]
    async fn test_stop_returns_to_stopped() {
        let listener = listener();
        let addr = listener.ensure(config("orders")).await.unwrap();
        assert!(!listener.status().is_degraded());

        listener.stop().await;
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert_eq!(listener.local_addr(), None);
        assert!(!listener.status().requested);
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();
        let filters = HashMap::from([
            (filter_keys::HTTP_HOST.to_string(), "127.0.0.1".to_string()),
            (filter_keys::HTTP_PORT.to_string(), port.to_string()),
        ]);

        let listener = listener();
        let result = listener.ensure(ServerConfig::from_filters(&filters).unwrap()).await;

        assert!(matches!(result, Err(ListenerError::Bind { .. })));
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(listener.status().is_degraded());
    }

    #[tokio::test]
    async fn test_auto_restart_is_bounded() {
        let listener = listener();
        listener.ensure(config("orders")).await.unwrap();

        for _ in 0..MAX_AUTO_RESTARTS {
            kill_server(&listener).await;
            assert!(listener.ensure(config("orders")).await.is_ok());
        }

        kill_server(&listener).await;
        assert!(matches!(
            listener.ensure(config("orders")).await,
            Err(ListenerError::RestartLimit { restarts: MAX_AUTO_RESTARTS })
        ));

        // A new configuration resets the budget
        assert!(listener.ensure(config("billing")).await.is_ok());
        listener.stop().await;
    }
}

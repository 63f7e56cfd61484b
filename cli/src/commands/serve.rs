// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway node: serve the plugin RPC contract until Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use flowgate_gateway_core::domain::node_config::{GatewayNodeConfig, RegistrationSettings};
use flowgate_gateway_core::GatewayPlugin;
use flowgate_plugin_sdk::{serve, RegistrationConfig, ServeOptions};

fn registration_config(config: &GatewayNodeConfig, settings: &RegistrationSettings) -> RegistrationConfig {
    RegistrationConfig {
        server_url: settings.server_url.clone(),
        endpoint: config.advertise_endpoint(),
        max_attempts: settings.max_attempts,
        retry_delay: settings.retry_delay(),
        initial_delay: settings.initial_delay(),
    }
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve gRPC address {}:{}", host, port))?
        .next()
        .with_context(|| format!("No address found for {}:{}", host, port))
}

pub async fn run(config: GatewayNodeConfig) -> Result<()> {
    config.validate().context("Configuration validation failed")?;

    let plugin = Arc::new(GatewayPlugin::from_config(&config));

    if config.http.auto_start {
        let addr = plugin
            .start_listener(&config.http.filters)
            .await
            .map_err(|status| anyhow::anyhow!("Failed to start HTTP listener: {}", status.message()))?;
        info!(addr = %addr, "HTTP listener started at boot");
    }

    let addr = resolve_addr(&config.grpc.host, config.grpc.port).await?;
    let mut options = ServeOptions::new(addr);
    if let Some(settings) = &config.registration {
        info!(server_url = %settings.server_url, "Registration with workflow server enabled");
        options = options.with_registration(registration_config(&config, settings));
    }

    info!(addr = %addr, "flowgate HTTP gateway starting");
    let served = serve(plugin.clone(), options, shutdown_signal()).await;

    info!("Shutting down HTTP gateway");
    plugin.shutdown().await;

    served.context("Plugin gRPC server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

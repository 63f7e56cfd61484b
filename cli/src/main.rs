// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # flowgate HTTP Gateway
//!
//! The `flowgate` binary runs the HTTP gateway as a trigger plugin node.
//!
//! ## Architecture
//!
//! - **Default mode**: `flowgate` (or `flowgate serve`) serves the plugin RPC
//!   contract; the HTTP listener starts on the first trigger subscription, or
//!   at boot when `http.auto_start` is set
//! - **Registration**: with a workflow server URL the plugin announces itself
//!   in the background
//!
//! ## Commands
//!
//! - `flowgate serve` - Run the gateway node
//! - `flowgate config show|validate|generate` - Configuration management

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use flowgate_gateway::commands::{self, ConfigCommand};
use flowgate_gateway::telemetry::{self, LogFormat};
use flowgate_gateway_core::domain::node_config::{GatewayNodeConfig, RegistrationSettings};

/// flowgate HTTP Gateway - turn HTTP requests into workflow trigger events
#[derive(Parser)]
#[command(name = "flowgate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FLOWGATE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// gRPC bind host (default: 0.0.0.0)
    #[arg(long, global = true)]
    host: Option<String>,

    /// gRPC port (default: 50051)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Workflow server URL to register with
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, env = "FLOWGATE_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "FLOWGATE_METRICS_PORT")]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway node (default)
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

impl Cli {
    /// Flags win over the file and the environment.
    fn apply_overrides(&self, config: &mut GatewayNodeConfig) {
        if let Some(host) = &self.host {
            config.grpc.host = host.clone();
        }
        if let Some(port) = self.port {
            config.grpc.port = port;
        }
        if let Some(server) = &self.server {
            match config.registration.as_mut() {
                Some(registration) => registration.server_url = server.clone(),
                None => config.registration = Some(RegistrationSettings::new(server.clone())),
            }
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { command }) => {
            telemetry::init_logging(cli.log_level.as_deref().unwrap_or("warn"), LogFormat::Text)?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Serve) | None => {
            let mut config =
                telemetry::with_bootstrap_logging(|| GatewayNodeConfig::load_or_default(cli.config.clone()))?;
            cli.apply_overrides(&mut config);

            let format = match cli.log_format {
                Some(format) => format,
                None => config.logging.format.parse()?,
            };
            telemetry::init_logging(&config.logging.level, format)?;

            if let Some(port) = cli.metrics_port {
                telemetry::init_metrics(port)?;
            }

            info!(version = env!("CARGO_PKG_VERSION"), "Starting flowgate HTTP gateway");
            commands::serve::run(config).await
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use flowgate_gateway_core::domain::gateway_config::ServerConfig;
use flowgate_gateway_core::domain::node_config::GatewayNodeConfig;

const TEMPLATE_EXAMPLES: &str = include_str!("../../templates/flowgate-config.yaml");
const TEMPLATE_MINIMAL: &str = include_str!("../../templates/flowgate-config-minimal.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./flowgate-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(&output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = GatewayNodeConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. FLOWGATE_CONFIG_PATH: {}",
            std::env::var("FLOWGATE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./flowgate-config.yaml");
        println!("  4. ~/.flowgate/config.yaml");
        println!("  5. /etc/flowgate/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Plugin RPC:".bold());
    println!("  Listen: {}:{}", config.grpc.host, config.grpc.port);
    match &config.registration {
        Some(registration) => {
            println!("  Registration: {}", registration.server_url);
            println!("  Advertised endpoint: {}", config.advertise_endpoint());
        }
        None => println!("  Registration: {}", "(disabled)".dimmed()),
    }
    println!();

    println!("{}", "HTTP Listener:".bold());
    if config.http.auto_start {
        let server = ServerConfig::from_filters(&config.http.filters)
            .context("Invalid http.filters")?;
        println!("  Auto start: yes ({})", server.bind_addr());
        println!("  Auth: {:?}", server.security.mode());
        for route in server.routes.routes() {
            let mode = if route.sync_response {
                format!("sync {}ms", route.response_timeout_ms)
            } else {
                "async".to_string()
            };
            println!(
                "    {} {:?} → {} ({})",
                route.path.bold(),
                route.methods,
                route.target_workflow,
                mode
            );
        }
    } else {
        println!("  Auto start: no (started by the first trigger subscription)");
    }
    println!();

    println!("{}", "Event Bus:".bold());
    println!(
        "  Capacity: inbound {}, per subscriber {}",
        config.event_bus.inbound_capacity, config.event_bus.subscriber_capacity
    );
    println!(
        "  Grace: publish {}ms, delivery {}ms",
        config.event_bus.publish_grace_ms, config.event_bus.delivery_grace_ms
    );
    println!("  Correlation sweep: {}ms", config.correlation.sweep_interval_ms);
    println!();

    println!("{}", "Logging:".bold());
    println!("  Level: {}", config.logging.level);
    println!("  Format: {}", config.logging.format);
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = GatewayNodeConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        TEMPLATE_EXAMPLES
    } else {
        TEMPLATE_MINIMAL
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

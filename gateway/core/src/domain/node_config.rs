// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Node Configuration
//
// Process-level settings for a gateway plugin node:
// - gRPC bind address for the plugin contract
// - optional registration with the workflow server
// - HTTP listener auto-start with default filters
// - event bus and correlation tuning
// - logging

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::gateway_config::ServerConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayNodeConfig {
    #[serde(default)]
    pub grpc: GrpcConfig,

    /// Registration with the workflow server (disabled when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationSettings>,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub event_bus: EventBusSettings,

    #[serde(default)]
    pub correlation: CorrelationSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcConfig {
    #[serde(default = "default_grpc_host")]
    pub host: String,

    #[serde(default = "default_grpc_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationSettings {
    /// Workflow server base URL, e.g. http://localhost:3001
    pub server_url: String,

    /// Endpoint the server dials back; defaults to localhost:<grpc.port>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_endpoint: Option<String>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Start the HTTP listener at boot instead of on first subscription
    #[serde(default)]
    pub auto_start: bool,

    /// Filters used for the auto-started listener
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusSettings {
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,

    #[serde(default = "default_publish_grace_ms")]
    pub publish_grace_ms: u64,

    #[serde(default = "default_delivery_grace_ms")]
    pub delivery_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationSettings {
    /// Interval of the expired-entry sweep; 0 disables it
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// text | json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_grpc_host() -> String {
    "0.0.0.0".to_string()
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_inbound_capacity() -> usize {
    128
}

fn default_subscriber_capacity() -> usize {
    128
}

fn default_publish_grace_ms() -> u64 {
    3000
}

fn default_delivery_grace_ms() -> u64 {
    100
}

fn default_sweep_interval_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            host: default_grpc_host(),
            port: default_grpc_port(),
        }
    }
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            subscriber_capacity: default_subscriber_capacity(),
            publish_grace_ms: default_publish_grace_ms(),
            delivery_grace_ms: default_delivery_grace_ms(),
        }
    }
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RegistrationSettings {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            advertise_endpoint: None,
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl CorrelationSettings {
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

impl GatewayNodeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. FLOWGATE_CONFIG_PATH environment variable
    /// 2. ./flowgate-config.yaml (working directory)
    /// 3. ~/.flowgate/config.yaml (user home)
    /// 4. /etc/flowgate/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FLOWGATE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./flowgate-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".flowgate").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/flowgate/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("FLOWGATE_GRPC_HOST") {
            tracing::info!("Environment override: FLOWGATE_GRPC_HOST={}", host);
            self.grpc.host = host;
        }

        if let Ok(val) = std::env::var("FLOWGATE_GRPC_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: FLOWGATE_GRPC_PORT={}", port);
                    self.grpc.port = port;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for FLOWGATE_GRPC_PORT: '{}'. Expected a port number. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(url) = std::env::var("FLOWGATE_SERVER_URL") {
            tracing::info!("Environment override: FLOWGATE_SERVER_URL={}", url);
            match self.registration.as_mut() {
                Some(registration) => registration.server_url = url,
                None => self.registration = Some(RegistrationSettings::new(url)),
            }
        }

        if let Ok(level) = std::env::var("FLOWGATE_LOG_LEVEL") {
            tracing::info!("Environment override: FLOWGATE_LOG_LEVEL={}", level);
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.grpc.port == 0 {
            anyhow::bail!("grpc.port cannot be 0");
        }

        if let Some(registration) = &self.registration {
            if registration.server_url.trim().is_empty() {
                anyhow::bail!("registration.server_url cannot be empty");
            }
            if registration.max_attempts == 0 {
                anyhow::bail!("registration.max_attempts must be at least 1");
            }
        }

        if self.event_bus.inbound_capacity == 0 || self.event_bus.subscriber_capacity == 0 {
            anyhow::bail!("event_bus capacities must be greater than 0");
        }

        if self.event_bus.subscriber_capacity < self.event_bus.inbound_capacity {
            anyhow::bail!(
                "event_bus.subscriber_capacity ({}) must be at least inbound_capacity ({})",
                self.event_bus.subscriber_capacity,
                self.event_bus.inbound_capacity
            );
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("Invalid logging.format: '{}'. Must be 'text' or 'json'", other),
        }

        if self.http.auto_start {
            ServerConfig::from_filters(&self.http.filters)
                .map_err(|e| anyhow::anyhow!("http.filters: {}", e))?;
        }

        Ok(())
    }

    /// Endpoint advertised to the workflow server.
    pub fn advertise_endpoint(&self) -> String {
        self.registration
            .as_ref()
            .and_then(|r| r.advertise_endpoint.clone())
            .unwrap_or_else(|| format!("localhost:{}", self.grpc.port))
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Plugin registration with the workflow server
//!
//! A plugin announces itself by posting its manifest to
//! `{server_url}/api/plugins`. Registration is retried with a fixed delay and
//! never aborts the plugin process.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::proto::GetMetadataResponse;

#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Base URL of the workflow server, e.g. `http://localhost:3001`
    pub server_url: String,
    /// gRPC endpoint the server should dial back, e.g. `localhost:50051`
    pub endpoint: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub initial_delay: Duration,
}

impl RegistrationConfig {
    pub fn new(server_url: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            endpoint: endpoint.into(),
            max_attempts: 10,
            retry_delay: Duration::from_secs(3),
            initial_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("registration request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registration rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("registration failed after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Manifest body accepted by `POST /api/plugins`.
#[derive(Debug, Clone, Serialize)]
pub struct PluginManifest {
    pub kind: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub version: String,
    pub icon: String,
    pub category: String,
    pub endpoint: String,
    pub enabled: bool,
}

impl PluginManifest {
    pub fn from_metadata(metadata: &GetMetadataResponse, endpoint: impl Into<String>) -> Self {
        let category = metadata
            .category()
            .as_str_name()
            .trim_start_matches("NODE_CATEGORY_")
            .to_lowercase();

        Self {
            kind: "node".to_string(),
            name: metadata.name.clone(),
            display_name: metadata.display_name.clone(),
            description: metadata.description.clone(),
            version: metadata.version.clone(),
            icon: metadata.icon.clone(),
            category,
            endpoint: endpoint.into(),
            enabled: true,
        }
    }
}

/// Client for the workflow server's plugin registry.
pub struct RegistrationClient {
    base_url: String,
    client: Client,
}

impl RegistrationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub async fn register(&self, manifest: &PluginManifest) -> Result<(), RegistrationError> {
        let url = format!("{}/api/plugins", self.base_url);
        let response = self.client.post(&url).json(manifest).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RegistrationError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Register, retrying up to `max_attempts` times.
pub async fn register_with_retry(
    config: &RegistrationConfig,
    metadata: &GetMetadataResponse,
) -> Result<(), RegistrationError> {
    let manifest = PluginManifest::from_metadata(metadata, config.endpoint.clone());
    let client = RegistrationClient::new(config.server_url.clone());

    tokio::time::sleep(config.initial_delay).await;

    for attempt in 1..=config.max_attempts {
        match client.register(&manifest).await {
            Ok(()) => {
                info!(
                    plugin = %manifest.name,
                    server = %config.server_url,
                    attempt,
                    "Plugin registered"
                );
                return Ok(());
            }
            Err(e) => {
                warn!(
                    plugin = %manifest.name,
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %e,
                    "Plugin registration attempt failed"
                );
                if attempt < config.max_attempts {
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }

    error!(
        plugin = %manifest.name,
        server = %config.server_url,
        "Plugin registration gave up; continuing unregistered"
    );
    Err(RegistrationError::Exhausted {
        attempts: config.max_attempts,
    })
}

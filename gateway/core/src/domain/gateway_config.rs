// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Gateway Listener Configuration
//!
//! Parses the flat `SubscribeTrigger` filter map into an immutable
//! [`ServerConfig`]. Two configs comparing equal describe the same listener;
//! any difference forces a full listener restart.
//!
//! ## Recognized filters
//!
//! | Filter              | Meaning                                         |
//! |---------------------|-------------------------------------------------|
//! | `routes_json`       | JSON array of route objects                     |
//! | `routes`            | JSON, or `METHOD:/path,/path` list              |
//! | `target_workflow`   | default workflow for routes that name none      |
//! | `http_host`         | bind host (default `0.0.0.0`)                   |
//! | `http_port`         | bind port (default 8080, `0` = ephemeral)       |
//! | `max_body_bytes`    | request body limit (default 10 MiB)             |
//! | `api_key`           | enables API-key auth                            |
//! | `hmac_secret`       | enables HMAC auth (wins over `api_key`)         |
//! | `signature_header`  | HMAC signature header (default `X-Signature`)   |
//! | `timestamp_header`  | HMAC timestamp header (default `X-Timestamp`)   |
//! | `timestamp_skew_ms` | allowed HMAC clock skew (default 300000)        |
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Listener configuration value objects

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use super::route::{MethodFilter, RouteConfig, RouteTable};

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Signature";
pub const DEFAULT_TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const DEFAULT_MAX_CLOCK_SKEW_MS: u64 = 300_000;

pub mod filter_keys {
    pub const ROUTES_JSON: &str = "routes_json";
    pub const ROUTES: &str = "routes";
    pub const TARGET_WORKFLOW: &str = "target_workflow";
    pub const HTTP_HOST: &str = "http_host";
    pub const HTTP_PORT: &str = "http_port";
    pub const MAX_BODY_BYTES: &str = "max_body_bytes";
    pub const API_KEY: &str = "api_key";
    pub const HMAC_SECRET: &str = "hmac_secret";
    pub const SIGNATURE_HEADER: &str = "signature_header";
    pub const TIMESTAMP_HEADER: &str = "timestamp_header";
    pub const TIMESTAMP_SKEW_MS: &str = "timestamp_skew_ms";
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid routes configuration: {0}")]
    InvalidRoutes(String),

    #[error("invalid route '{path}': {reason}")]
    InvalidRoute { path: String, reason: String },
}

/// Which authenticator a [`SecurityConfig`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    ApiKey,
    Hmac,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub api_key: Option<String>,
    pub hmac_secret: Option<String>,
    pub signature_header: String,
    pub timestamp_header: String,
    pub max_clock_skew_ms: u64,
}

impl SecurityConfig {
    pub fn from_filters(filters: &HashMap<String, String>) -> Self {
        let non_empty = |key: &str| {
            filters
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let max_clock_skew_ms = non_empty(filter_keys::TIMESTAMP_SKEW_MS)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_CLOCK_SKEW_MS);

        Self {
            api_key: non_empty(filter_keys::API_KEY),
            hmac_secret: non_empty(filter_keys::HMAC_SECRET),
            signature_header: non_empty(filter_keys::SIGNATURE_HEADER)
                .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string()),
            timestamp_header: non_empty(filter_keys::TIMESTAMP_HEADER)
                .unwrap_or_else(|| DEFAULT_TIMESTAMP_HEADER.to_string()),
            max_clock_skew_ms,
        }
    }

    /// HMAC secret present → HMAC; else API key present → API key; else none.
    pub fn mode(&self) -> AuthMode {
        if self.hmac_secret.is_some() {
            AuthMode::Hmac
        } else if self.api_key.is_some() {
            AuthMode::ApiKey
        } else {
            AuthMode::None
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::from_filters(&HashMap::new())
    }
}

// Secrets stay out of logs
impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("mode", &self.mode())
            .field("signature_header", &self.signature_header)
            .field("timestamp_header", &self.timestamp_header)
            .field("max_clock_skew_ms", &self.max_clock_skew_ms)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub routes: RouteTable,
    pub security: SecurityConfig,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn from_filters(filters: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = filters
            .get(filter_keys::HTTP_PORT)
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);

        let host = filters
            .get(filter_keys::HTTP_HOST)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_HTTP_HOST)
            .to_string();

        let max_body_bytes = filters
            .get(filter_keys::MAX_BODY_BYTES)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self {
            host,
            port,
            routes: RouteTable::new(parse_routes(filters)?),
            security: SecurityConfig::from_filters(filters),
            max_body_bytes,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            routes: RouteTable::new(default_routes("")),
            security: SecurityConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRoutes {
    Many(Vec<RawRoute>),
    One(RawRoute),
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    path: String,
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    target_workflow: String,
    #[serde(default)]
    response_timeout_ms: i64,
    #[serde(default)]
    sync_response: bool,
}

impl RawRoute {
    fn into_route(self, default_workflow: &str) -> Result<RouteConfig, ConfigError> {
        let workflow = if self.target_workflow.trim().is_empty() {
            default_workflow.to_string()
        } else {
            self.target_workflow
        };
        let route = RouteConfig {
            path: self.path.trim().to_string(),
            methods: MethodFilter::from_list(&self.methods),
            target_workflow: workflow,
            sync_response: self.sync_response,
            response_timeout_ms: self.response_timeout_ms.max(0) as u64,
        };
        validate_path(&route.path)?;
        Ok(route.normalized())
    }
}

fn validate_path(path: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') {
        return Err(ConfigError::InvalidRoute {
            path: path.to_string(),
            reason: "path must start with '/'".to_string(),
        });
    }
    Ok(())
}

fn parse_routes(filters: &HashMap<String, String>) -> Result<Vec<RouteConfig>, ConfigError> {
    let default_workflow = filters
        .get(filter_keys::TARGET_WORKFLOW)
        .map(|v| v.trim())
        .unwrap_or_default();

    if let Some(raw) = filters.get(filter_keys::ROUTES_JSON).filter(|v| !v.trim().is_empty()) {
        let parsed: Vec<RawRoute> = serde_json::from_str(raw)
            .map_err(|e| ConfigError::InvalidRoutes(e.to_string()))?;
        return parsed
            .into_iter()
            .map(|r| r.into_route(default_workflow))
            .collect();
    }

    if let Some(raw) = filters.get(filter_keys::ROUTES).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if raw.starts_with('[') || raw.starts_with('{') {
            if let Ok(parsed) = serde_json::from_str::<RawRoutes>(raw) {
                let routes = match parsed {
                    RawRoutes::Many(routes) => routes,
                    RawRoutes::One(route) => vec![route],
                };
                return routes
                    .into_iter()
                    .map(|r| r.into_route(default_workflow))
                    .collect();
            }
        }
        return parse_delimited_routes(raw, default_workflow);
    }

    Ok(default_routes(default_workflow))
}

/// `POST:/orders, GET:/status, /anything`
fn parse_delimited_routes(raw: &str, default_workflow: &str) -> Result<Vec<RouteConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (methods, path) = match entry.split_once(':') {
                Some((method, path)) => (MethodFilter::from_list([method]), path.trim()),
                None => (MethodFilter::Any, entry),
            };
            validate_path(path)?;
            Ok(RouteConfig::new(path, methods, default_workflow))
        })
        .collect()
}

fn default_routes(default_workflow: &str) -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("/webhook", MethodFilter::from_list(["POST", "GET"]), default_workflow),
        RouteConfig::new("/api/v1/orders", MethodFilter::from_list(["POST"]), default_workflow),
        RouteConfig::new("/api/v1/status", MethodFilter::from_list(["GET"]), default_workflow),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_filters(&HashMap::new()).unwrap();
        assert_eq!(config.port, DEFAULT_HTTP_PORT);
        assert_eq!(config.host, DEFAULT_HTTP_HOST);
        assert_eq!(config.security.mode(), AuthMode::None);
        assert_eq!(config.security.signature_header, "X-Signature");
        assert_eq!(config.security.max_clock_skew_ms, 300_000);

        let paths: Vec<_> = config.routes.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["/webhook", "/api/v1/orders", "/api/v1/status"]);
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_routes_json() {
        let config = ServerConfig::from_filters(&filters(&[(
            "routes_json",
            r#"[{"path":"/orders","methods":["post"],"target_workflow":"orders","sync_response":true}]"#,
        )]))
        .unwrap();

        let route = &config.routes.routes()[0];
        assert_eq!(route.path, "/orders");
        assert!(route.methods.allows("POST"));
        assert!(!route.methods.allows("GET"));
        assert!(route.sync_response);
        assert_eq!(route.response_timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_routes_json_is_an_error() {
        let err = ServerConfig::from_filters(&filters(&[("routes_json", "not json")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoutes(_)));
    }

    #[test]
    fn test_routes_delimited_uses_default_workflow() {
        let config = ServerConfig::from_filters(&filters(&[
            ("routes", "POST:/orders, /anything"),
            ("target_workflow", "main"),
        ]))
        .unwrap();

        let routes = config.routes.routes();
        assert_eq!(routes.len(), 2);
        assert!(routes[0].methods.allows("POST"));
        assert!(!routes[0].methods.allows("GET"));
        assert_eq!(routes[1].methods, MethodFilter::Any);
        assert!(routes.iter().all(|r| r.target_workflow == "main"));
    }

    #[test]
    fn test_routes_single_json_object() {
        let config = ServerConfig::from_filters(&filters(&[(
            "routes",
            r#"{"path":"/one","methods":["GET"]}"#,
        )]))
        .unwrap();
        assert_eq!(config.routes.routes().len(), 1);
        assert_eq!(config.routes.routes()[0].path, "/one");
    }

    #[test]
    fn test_route_path_must_be_absolute() {
        let err = ServerConfig::from_filters(&filters(&[("routes", "POST:orders")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoute { .. }));
    }

    #[test]
    fn test_port_parsing() {
        let config = ServerConfig::from_filters(&filters(&[("http_port", "9090")])).unwrap();
        assert_eq!(config.port, 9090);
        let config = ServerConfig::from_filters(&filters(&[("http_port", "junk")])).unwrap();
        assert_eq!(config.port, DEFAULT_HTTP_PORT);
        let config = ServerConfig::from_filters(&filters(&[("http_port", "0")])).unwrap();
        assert_eq!(config.port, 0);
    }

    #[test]
    fn test_auth_mode_selection() {
        let both = SecurityConfig::from_filters(&filters(&[("api_key", "k"), ("hmac_secret", "s")]));
        assert_eq!(both.mode(), AuthMode::Hmac);

        let key = SecurityConfig::from_filters(&filters(&[("api_key", "k"), ("hmac_secret", " ")]));
        assert_eq!(key.mode(), AuthMode::ApiKey);
    }

    #[test]
    fn test_skew_override() {
        let sec = SecurityConfig::from_filters(&filters(&[("timestamp_skew_ms", "1000")]));
        assert_eq!(sec.max_clock_skew_ms, 1000);
        let sec = SecurityConfig::from_filters(&filters(&[("timestamp_skew_ms", "-5")]));
        assert_eq!(sec.max_clock_skew_ms, DEFAULT_MAX_CLOCK_SKEW_MS);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let sec = SecurityConfig::from_filters(&filters(&[("api_key", "super-secret")]));
        assert!(!format!("{:?}", sec).contains("super-secret"));
    }

    #[test]
    fn test_identical_filters_compare_equal() {
        let f = filters(&[("http_port", "9000"), ("api_key", "k")]);
        assert_eq!(
            ServerConfig::from_filters(&f).unwrap(),
            ServerConfig::from_filters(&f).unwrap()
        );
        let mut changed = f.clone();
        changed.insert("http_port".into(), "9001".into());
        assert_ne!(
            ServerConfig::from_filters(&f).unwrap(),
            ServerConfig::from_filters(&changed).unwrap()
        );
    }
}

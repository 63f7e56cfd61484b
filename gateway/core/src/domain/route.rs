// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Static routing rules for the HTTP front door.

use std::collections::BTreeSet;
use std::time::Duration;

/// Timeout applied to sync requests that do not name one.
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 30_000;

/// Allowed HTTP methods for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(BTreeSet<String>),
}

impl MethodFilter {
    /// Build from raw method names. Names are trimmed and upper-cased; an
    /// empty list or one containing `ANY`/`*` allows everything.
    pub fn from_list<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = methods
            .into_iter()
            .map(|m| m.as_ref().trim().to_uppercase())
            .filter(|m| !m.is_empty())
            .collect();

        if set.is_empty() || set.contains("ANY") || set.contains("*") {
            MethodFilter::Any
        } else {
            MethodFilter::Only(set)
        }
    }

    pub fn allows(&self, method: &str) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(set) => set.contains(&method.to_uppercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Exact path, or a prefix when it ends with `/`.
    pub path: String,
    pub methods: MethodFilter,
    pub target_workflow: String,
    pub sync_response: bool,
    /// Zero means "not configured".
    pub response_timeout_ms: u64,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, methods: MethodFilter, target_workflow: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods,
            target_workflow: target_workflow.into(),
            sync_response: false,
            response_timeout_ms: 0,
        }
    }

    pub fn sync(mut self, timeout_ms: u64) -> Self {
        self.sync_response = true;
        self.response_timeout_ms = timeout_ms;
        self.normalized()
    }

    /// Sync routes without a usable timeout get the default.
    pub fn normalized(mut self) -> Self {
        if self.sync_response && self.response_timeout_ms == 0 {
            self.response_timeout_ms = DEFAULT_SYNC_TIMEOUT_MS;
        }
        self
    }

    pub fn is_prefix(&self) -> bool {
        self.path.ends_with('/')
    }

    pub fn matches_path(&self, path: &str) -> bool {
        if self.is_prefix() {
            path.starts_with(&self.path)
        } else {
            path == self.path
        }
    }

    pub fn configured_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }
}

/// Route lookup: exact paths win, then the longest matching prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteConfig> {
        if let Some(exact) = self
            .routes
            .iter()
            .find(|r| !r.is_prefix() && r.path == path)
        {
            return Some(exact);
        }

        self.routes
            .iter()
            .filter(|r| r.is_prefix() && r.matches_path(path))
            .max_by_key(|r| r.path.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_filter_normalizes() {
        let filter = MethodFilter::from_list([" post ", "get"]);
        assert!(filter.allows("POST"));
        assert!(filter.allows("get"));
        assert!(!filter.allows("DELETE"));

        assert_eq!(MethodFilter::from_list(["GET", "any"]), MethodFilter::Any);
        assert_eq!(MethodFilter::from_list(Vec::<String>::new()), MethodFilter::Any);
        assert_eq!(MethodFilter::from_list(["*"]), MethodFilter::Any);
    }

    #[test]
    fn test_sync_route_gets_default_timeout() {
        let route = RouteConfig::new("/orders", MethodFilter::Any, "orders").sync(0);
        assert_eq!(route.response_timeout_ms, DEFAULT_SYNC_TIMEOUT_MS);

        let route = RouteConfig::new("/orders", MethodFilter::Any, "orders").sync(1500);
        assert_eq!(route.configured_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_exact_beats_prefix_and_longest_prefix_wins() {
        let table = RouteTable::new(vec![
            RouteConfig::new("/", MethodFilter::Any, "root"),
            RouteConfig::new("/hooks/", MethodFilter::Any, "hooks"),
            RouteConfig::new("/hooks/github", MethodFilter::Any, "github"),
        ]);

        assert_eq!(table.resolve("/hooks/github").unwrap().target_workflow, "github");
        assert_eq!(table.resolve("/hooks/gitlab").unwrap().target_workflow, "hooks");
        assert_eq!(table.resolve("/other").unwrap().target_workflow, "root");
    }

    #[test]
    fn test_exact_route_does_not_match_subpaths() {
        let table = RouteTable::new(vec![RouteConfig::new("/webhook", MethodFilter::Any, "")]);
        assert!(table.resolve("/webhook").is_some());
        assert!(table.resolve("/webhook/extra").is_none());
        assert!(table.resolve("/").is_none());
    }
}

//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest prefix wins, so overlapping prefixes stay deterministic
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use crate::config::GatewayConfig;
use crate::routing::rule::{RouteKind, RouteRule};

#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted by descending prefix length.
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { rules }
    }

    /// Compile the configured API routes plus one `/health/<service>`
    /// passthrough per routed service.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut rules: Vec<RouteRule> = config.routes.iter().map(RouteRule::from_config).collect();

        for service in &config.services {
            let Some(template) = config.routes.iter().find(|r| r.service == service.name) else {
                continue;
            };
            rules.push(RouteRule::health_passthrough(
                &service.name,
                &config.health_check.path,
                template,
            ));
        }

        Self::new(rules)
    }

    pub fn match_path(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Sorted API prefixes, listed in 404 bodies.
    pub fn known_prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.kind == RouteKind::Api)
            .map(|rule| rule.prefix.clone())
            .collect();
        prefixes.sort();
        prefixes
    }
}

//! Compiled route rules.
//!
//! # Responsibilities
//! - Hold the immutable per-route settings (target, auth, timeout, pool limits)
//! - Match a request path on segment boundaries
//! - Rewrite the matched prefix for the upstream request
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/api/auth` matches `/api/auth` and `/api/auth/...`, never `/api/authx`

use std::time::Duration;

use crate::config::{RetryConfig, RouteConfig};

/// What a rule forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Regular API traffic under `/api/...`.
    Api,
    /// `/health/<service>` forwarded to the service's own health endpoint.
    HealthPassthrough,
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub prefix: String,
    pub service: String,
    pub rewrite: Option<String>,
    pub requires_auth: bool,
    pub timeout: Duration,
    pub max_sockets: usize,
    pub max_free_sockets: usize,
    pub retry: Option<RetryConfig>,
    pub kind: RouteKind,
    pub description: String,
}

impl RouteRule {
    pub fn from_config(config: &RouteConfig) -> Self {
        Self {
            prefix: normalize_prefix(&config.prefix),
            service: config.service.clone(),
            rewrite: config.rewrite.clone(),
            requires_auth: config.requires_auth,
            timeout: Duration::from_millis(config.timeout_ms),
            max_sockets: config.max_sockets,
            max_free_sockets: config.max_free_sockets,
            retry: config.retry,
            kind: RouteKind::Api,
            description: config.description.clone(),
        }
    }

    /// `/health/<service>` rewritten to the service's probe path.
    pub fn health_passthrough(service: &str, health_path: &str, template: &RouteConfig) -> Self {
        Self {
            prefix: format!("/health/{}", service),
            service: service.to_string(),
            rewrite: Some(health_path.to_string()),
            requires_auth: false,
            timeout: Duration::from_millis(template.timeout_ms),
            max_sockets: template.max_sockets,
            max_free_sockets: template.max_free_sockets,
            retry: None,
            kind: RouteKind::HealthPassthrough,
            description: format!("Health of the {} service", service),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path (plus query) sent upstream.
    ///
    /// Without a rewrite the path is forwarded unchanged.
    pub fn rewrite_path(&self, path_and_query: &str) -> String {
        let Some(replacement) = &self.rewrite else {
            return path_and_query.to_string();
        };
        let Some(rest) = path_and_query.strip_prefix(self.prefix.as_str()) else {
            return path_and_query.to_string();
        };

        let replacement = replacement.trim_end_matches('/');
        let rewritten = format!("{}{}", replacement, rest);
        if rewritten.is_empty() || rewritten.starts_with('?') {
            format!("/{}", rewritten)
        } else {
            rewritten
        }
    }
}

/// Trailing slashes are insignificant: `/api/x/` and `/api/x` are one prefix.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(prefix: &str, rewrite: Option<&str>) -> RouteRule {
        RouteRule::from_config(&RouteConfig {
            prefix: prefix.into(),
            service: "todo".into(),
            rewrite: rewrite.map(String::from),
            requires_auth: true,
            timeout_ms: 60_000,
            max_sockets: 50,
            max_free_sockets: 10,
            retry: None,
            description: String::new(),
        })
    }

    #[test]
    fn matches_on_segment_boundaries() {
        let r = rule("/api/todos", None);
        assert!(r.matches("/api/todos"));
        assert!(r.matches("/api/todos/"));
        assert!(r.matches("/api/todos/42/items"));
        assert!(!r.matches("/api/todosx"));
        assert!(!r.matches("/api/todo"));
        assert!(!r.matches("/API/todos"));
    }

    #[test]
    fn trailing_slash_in_config_is_ignored() {
        let r = rule("/api/todos/", None);
        assert_eq!(r.prefix, "/api/todos");
        assert!(r.matches("/api/todos/1"));
    }

    #[test]
    fn rewrite_replaces_prefix_and_keeps_query() {
        let r = rule("/api/todos", Some("/v2/tasks"));
        assert_eq!(r.rewrite_path("/api/todos/7?done=true"), "/v2/tasks/7?done=true");
        assert_eq!(r.rewrite_path("/api/todos"), "/v2/tasks");

        let plain = rule("/api/todos", None);
        assert_eq!(plain.rewrite_path("/api/todos/7?x=1"), "/api/todos/7?x=1");
    }

    #[test]
    fn rewrite_to_root() {
        let r = rule("/api/todos", Some("/"));
        assert_eq!(r.rewrite_path("/api/todos"), "/");
        assert_eq!(r.rewrite_path("/api/todos?a=b"), "/?a=b");
        assert_eq!(r.rewrite_path("/api/todos/1"), "/1");
    }

    #[test]
    fn health_passthrough_targets_probe_path() {
        let template = crate::config::GatewayConfig::default().routes[1].clone();
        let r = RouteRule::health_passthrough("chat", "/health", &template);
        assert_eq!(r.kind, RouteKind::HealthPassthrough);
        assert!(!r.requires_auth);
        assert_eq!(r.rewrite_path("/health/chat"), "/health");
        assert_eq!(r.rewrite_path("/health/chat/deep"), "/health/deep");
    }
}

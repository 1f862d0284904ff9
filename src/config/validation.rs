//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing services)
//! - Validate value ranges (timeouts > 0, pool sizes > 0)
//! - Ensure the request deadline covers every route's retry budget
//! - Detect duplicate services and routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, PoolConfig, RetryConfig, RouteConfig};
use crate::resilience::backoff::calculate_backoff;
use crate::routing::rule::normalize_prefix;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{name}' has invalid url '{url}' (expected absolute http:// url)")]
    InvalidServiceUrl { name: String, url: String },

    #[error("route '{prefix}' references unknown service '{service}'")]
    UnknownService { prefix: String, service: String },

    #[error("route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    #[error("duplicate route prefix '{0}'")]
    DuplicatePrefix(String),

    #[error("route '{0}' must have a positive timeout")]
    ZeroTimeout(String),

    #[error("route '{0}' must allow at least one socket")]
    ZeroSockets(String),

    #[error("websocket tunnel targets unknown service '{0}'")]
    UnknownWebSocketService(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("auth.jwt_secret is required when routes require authentication")]
    MissingJwtSecret,

    #[error("invalid listener bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("route '{prefix}' may need {needed_ms}ms across retries but timeouts.request_secs allows {allowed_ms}ms")]
    RequestBudgetExceeded {
        prefix: String,
        needed_ms: u128,
        allowed_ms: u128,
    },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut names = HashSet::new();
    for service in &config.services {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        let valid_url = Url::parse(&service.url)
            .map(|u| u.scheme() == "http" && u.host().is_some())
            .unwrap_or(false);
        if !valid_url {
            errors.push(ValidationError::InvalidServiceUrl {
                name: service.name.clone(),
                url: service.url.clone(),
            });
        }
    }

    let mut prefixes = HashSet::new();
    for route in &config.routes {
        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix(route.prefix.clone()));
        }
        if !prefixes.insert(normalize_prefix(&route.prefix)) {
            errors.push(ValidationError::DuplicatePrefix(route.prefix.clone()));
        }
        if !names.contains(route.service.as_str()) {
            errors.push(ValidationError::UnknownService {
                prefix: route.prefix.clone(),
                service: route.service.clone(),
            });
        }
        if route.timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout(route.prefix.clone()));
        }
        if route.max_sockets == 0 {
            errors.push(ValidationError::ZeroSockets(route.prefix.clone()));
        }
    }

    if config.websocket.enabled && !names.contains(config.websocket.service.as_str()) {
        errors.push(ValidationError::UnknownWebSocketService(
            config.websocket.service.clone(),
        ));
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroValue("health_check.interval_secs"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("health_check.timeout_secs"));
    }
    if config.health_check.unhealthy_threshold == 0 {
        errors.push(ValidationError::ZeroValue("health_check.unhealthy_threshold"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs"));
    } else {
        let allowed = Duration::from_secs(config.timeouts.request_secs);
        for route in &config.routes {
            let needed = worst_case_duration(route, config.retries, &config.pool);
            if needed > allowed {
                errors.push(ValidationError::RequestBudgetExceeded {
                    prefix: route.prefix.clone(),
                    needed_ms: needed.as_millis(),
                    allowed_ms: allowed.as_millis(),
                });
            }
        }
    }

    if config.routes.iter().any(|r| r.requires_auth) && config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::MissingJwtSecret);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest a request on `route` can take inside the gateway: every attempt
/// waits out the socket queue and its own deadline, plus all backoff sleeps.
pub fn worst_case_duration(route: &RouteConfig, defaults: RetryConfig, pool: &PoolConfig) -> Duration {
    let retry = route.retry.unwrap_or(defaults);
    let attempts = retry.max_retries.saturating_add(1);
    let per_attempt = Duration::from_millis(route.timeout_ms.saturating_add(pool.queue_timeout_ms));

    let backoff: Duration = (1..=retry.max_retries)
        .map(|n| calculate_backoff(n, retry.base_delay_ms))
        .sum();

    per_attempt.saturating_mul(attempts).saturating_add(backoff)
}

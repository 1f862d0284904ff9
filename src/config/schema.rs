//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Backend service definitions.
    pub services: Vec<ServiceConfig>,

    /// Route definitions mapping path prefixes to services.
    pub routes: Vec<RouteConfig>,

    /// WebSocket tunnel settings.
    pub websocket: WebSocketConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Default retry policy.
    pub retries: RetryConfig,

    /// Outbound connection pool settings.
    pub pool: PoolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Cache connectivity reported by `/health`.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening.
    pub security: SecurityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            services: default_services(),
            routes: default_routes(),
            websocket: WebSocketConfig::default(),
            health_check: HealthCheckConfig::default(),
            retries: RetryConfig::default(),
            pool: PoolConfig::default(),
            timeouts: TimeoutConfig::default(),
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Look up a service definition by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Point every configured service at the same base URL.
    pub fn set_all_service_urls(&mut self, url: &str) {
        for service in &mut self.services {
            service.url = url.to_string();
        }
    }

    /// Point one service at a new base URL. Unknown names are ignored.
    pub fn set_service_url(&mut self, name: &str, url: &str) {
        if let Some(service) = self.services.iter_mut().find(|s| s.name == name) {
            service.url = url.to_string();
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// A backend service reachable through the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique logical name (e.g. "auth").
    pub name: String,

    /// Base URL (e.g. "http://auth-service:3001").
    pub url: String,
}

/// Route configuration mapping a path prefix to a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path prefix to match, on segment boundaries.
    pub prefix: String,

    /// Target service name.
    pub service: String,

    /// Replacement for the matched prefix when forwarding.
    #[serde(default)]
    pub rewrite: Option<String>,

    /// Whether a bearer token is required.
    #[serde(default)]
    pub requires_auth: bool,

    /// Per-attempt upstream timeout in milliseconds.
    #[serde(default = "default_route_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum concurrent upstream connections.
    #[serde(default = "default_max_sockets")]
    pub max_sockets: usize,

    /// Maximum idle keep-alive connections.
    #[serde(default = "default_max_free_sockets")]
    pub max_free_sockets: usize,

    /// Retry override for this route.
    #[serde(default)]
    pub retry: Option<RetryConfig>,

    /// Shown by `/api/docs`.
    #[serde(default)]
    pub description: String,
}

fn default_route_timeout_ms() -> u64 {
    60_000
}

fn default_max_sockets() -> usize {
    50
}

fn default_max_free_sockets() -> usize {
    10
}

/// WebSocket tunnel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Enable the tunnel.
    pub enabled: bool,

    /// Client-facing path prefix.
    pub path: String,

    /// Target service name.
    pub service: String,

    /// Upgrade path on the target service.
    pub upstream_path: String,

    /// Upstream handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/ws".to_string(),
            service: "chat".to_string(),
            upstream_path: "/ws".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe on each service.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 10,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Linear backoff unit: retry `n` waits `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
        }
    }
}

/// Outbound connection pool configuration shared by all services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Dispatches allowed to wait for a free socket.
    pub max_queued: usize,

    /// How long a queued dispatch waits for a socket, in milliseconds.
    pub queue_timeout_ms: u64,

    /// Idle keep-alive timeout in seconds.
    pub idle_timeout_secs: u64,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_queued: 256,
            queue_timeout_ms: 5_000,
            idle_timeout_secs: 90,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Timeout configuration for the inbound side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall request timeout in seconds, covering all retries.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HS256 signing secret.
    pub jwt_secret: String,

    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

/// Cache connectivity settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Connection string (e.g. "redis://localhost:6379").
    pub url: String,

    /// Connectivity probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            timeout_ms: 1_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "service_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Include internal error details in 500 responses (development only).
    pub expose_error_details: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
            expose_error_details: false,
        }
    }
}

/// (service name, default port, API prefix, description)
const SERVICE_TABLE: [(&str, u16, &str, &str); 9] = [
    ("auth", 3001, "/api/auth", "Authentication and token issuance"),
    ("user", 3002, "/api/users", "User and group management"),
    ("chat", 3003, "/api/chat", "Chat rooms and messages"),
    ("attendance", 3004, "/api/attendance", "Attendance records"),
    ("todo", 3005, "/api/todos", "Task boards"),
    ("report", 3006, "/api/reports", "Reports"),
    ("approval", 3007, "/api/approvals", "Approval workflows"),
    ("workplace", 3008, "/api/workplace", "Workplace settings"),
    ("notification", 3009, "/api/notifications", "Notifications"),
];

fn default_services() -> Vec<ServiceConfig> {
    SERVICE_TABLE
        .iter()
        .map(|(name, port, _, _)| ServiceConfig {
            name: (*name).to_string(),
            url: format!("http://localhost:{}", port),
        })
        .collect()
}

fn default_routes() -> Vec<RouteConfig> {
    SERVICE_TABLE
        .iter()
        .map(|(name, _, prefix, description)| {
            let is_auth = *name == "auth";
            RouteConfig {
                prefix: (*prefix).to_string(),
                service: (*name).to_string(),
                rewrite: None,
                requires_auth: !is_auth,
                timeout_ms: if is_auth { 90_000 } else { default_route_timeout_ms() },
                max_sockets: if is_auth { 100 } else { default_max_sockets() },
                max_free_sockets: if is_auth { 20 } else { default_max_free_sockets() },
                retry: is_auth.then(RetryConfig::default),
                description: (*description).to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routes_cover_every_service() {
        let config = GatewayConfig::default();
        assert_eq!(config.services.len(), 9);
        assert_eq!(config.routes.len(), 9);
        for route in &config.routes {
            assert!(config.service(&route.service).is_some());
        }
    }

    #[test]
    fn auth_route_is_public_with_extended_limits() {
        let config = GatewayConfig::default();
        let auth = config.routes.iter().find(|r| r.prefix == "/api/auth").unwrap();
        assert!(!auth.requires_auth);
        assert_eq!(auth.timeout_ms, 90_000);
        assert_eq!(auth.max_sockets, 100);
        assert!(auth.retry.is_some());

        let todos = config.routes.iter().find(|r| r.prefix == "/api/todos").unwrap();
        assert!(todos.requires_auth);
        assert_eq!(todos.timeout_ms, 60_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [retries]
            base_delay_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.retries.base_delay_ms, 50);
        assert_eq!(config.retries.max_retries, 2);
        assert_eq!(config.routes.len(), 9);
    }
}

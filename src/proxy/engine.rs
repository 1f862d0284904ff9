//! Request forwarding pipeline.
//!
//! # Responsibilities
//! - Match the route, resolve the principal, consult the breaker
//! - Prepare the upstream request (body, path, headers)
//! - Dispatch through the service pool under the retry policy
//! - Account every attempt against service health
//! - Map terminal failures to client-facing errors
//!
//! # Request States
//! ```text
//! Received → Authenticating → BreakerCheck → Dispatching
//!     → Succeeded
//!     → TransientFailure → Retrying → Dispatching
//!     → TerminalFailure (503/504)
//! RejectedByBreaker (503), Unauthorized (401)
//! ```
//!
//! # Design Decisions
//! - Authentication runs before the breaker
//! - The breaker is consulted once per request, not per retry
//! - Identity headers are computed once and reused on every attempt

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use tracing::Instrument;

use crate::auth::{Principal, PrincipalResolver};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::health::passive;
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::response::relay;
use crate::observability::metrics;
use crate::proxy::attempt::ProxyAttempt;
use crate::proxy::failure::DispatchFailure;
use crate::proxy::pool::UpstreamPools;
use crate::registry::ServiceRegistry;
use crate::resilience::{AbortSignal, CircuitBreaker, Decision, RetryPolicy};
use crate::routing::{RouteRule, RouteTable};
use crate::security::{read_limited, upstream_headers, BodyError, ClientContext};

pub struct ProxyEngine {
    routes: Arc<RouteTable>,
    registry: Arc<ServiceRegistry>,
    breaker: CircuitBreaker,
    resolver: PrincipalResolver,
    pools: UpstreamPools,
    retry: RetryPolicy,
    max_body_size: usize,
}

impl ProxyEngine {
    pub fn new(config: &GatewayConfig, routes: Arc<RouteTable>, registry: Arc<ServiceRegistry>) -> Self {
        let pools = UpstreamPools::from_rules(routes.rules(), &config.pool);

        Self {
            breaker: CircuitBreaker::new(registry.clone()),
            resolver: PrincipalResolver::new(&config.auth),
            pools,
            retry: RetryPolicy::new(config.retries),
            max_body_size: config.security.max_body_size,
            routes,
            registry,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Route and forward one client request.
    ///
    /// Retries stop early once `abort` fires; an attempt already in flight
    /// still completes and is accounted.
    pub async fn handle(
        &self,
        request: Request<Body>,
        client: ClientContext,
        abort: AbortSignal,
    ) -> Result<Response<Body>, GatewayError> {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some(rule) = self.routes.match_path(&path) else {
            tracing::warn!(request_id = %request.request_id(), method = %method, path = %path, "No route matched");
            metrics::record_request(method.as_str(), 404, "none", start);
            return Err(GatewayError::RouteNotFound {
                path,
                available: self.routes.known_prefixes(),
            });
        };

        let span = tracing::info_span!(
            "proxy",
            request_id = %request.request_id(),
            service = %rule.service,
            method = %method,
            path = %path,
        );
        let result = self.forward(rule, request, client, &abort).instrument(span).await;

        let status = match &result {
            Ok(response) => response.status(),
            Err(e) => e.status(),
        };
        metrics::record_request(method.as_str(), status.as_u16(), &rule.service, start);
        result
    }

    async fn forward(
        &self,
        rule: &RouteRule,
        request: Request<Body>,
        client: ClientContext,
        abort: &AbortSignal,
    ) -> Result<Response<Body>, GatewayError> {
        let principal = self.authenticate(rule, &request)?;

        if self.breaker.allow(&rule.service) == Decision::Rejected {
            tracing::warn!("Circuit open, failing fast");
            return Err(GatewayError::CircuitOpen {
                service: rule.service.clone(),
            });
        }

        let descriptor = self.registry.get(&rule.service).ok_or_else(|| {
            GatewayError::Internal(format!("service {} is not registered", rule.service))
        })?;
        let pool = self.pools.get(&rule.service).ok_or_else(|| {
            GatewayError::Internal(format!("no connection pool for service {}", rule.service))
        })?;

        let (parts, body) = request.into_parts();
        let body = read_limited(&parts.headers, body, self.max_body_size)
            .await
            .map_err(|e| match e {
                BodyError::TooLarge { limit } => {
                    tracing::warn!(limit, "Request body too large");
                    GatewayError::PayloadTooLarge
                }
                BodyError::Read(detail) => GatewayError::Internal(detail),
            })?;

        let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let target = descriptor.upstream_uri(&rule.rewrite_path(path_and_query));
        let uri: Uri = target
            .parse()
            .map_err(|e| GatewayError::Internal(format!("invalid upstream uri {}: {}", target, e)))?;
        let headers = upstream_headers(&parts.headers, &client, principal.as_ref());

        let policy = rule.retry.map(RetryPolicy::new).unwrap_or(self.retry);
        let service = rule.service.as_str();
        let timeout = rule.timeout;
        let registry = &self.registry;
        let (method, uri, headers, body, target, pool) =
            (&parts.method, &uri, &headers, &body, target.as_str(), &pool);

        let result = policy
            .run(abort, move |number| {
                let attempt = ProxyAttempt::start(number);

                let mut request = Request::new(Body::from(body.clone()));
                *request.method_mut() = method.clone();
                *request.uri_mut() = uri.clone();
                *request.headers_mut() = headers.clone();
                if let Some(id) = attempt.request_id_header() {
                    request.headers_mut().insert(X_REQUEST_ID, id);
                }

                async move {
                    if number > 1 {
                        metrics::record_retry(service);
                    }

                    let result = pool.send(request, timeout).await;
                    passive::observe(registry, service, &result);

                    let duration_ms = attempt.elapsed().as_millis() as u64;
                    match &result {
                        Ok(response) => {
                            metrics::record_attempt(service, "success");
                            tracing::info!(
                                method = %method,
                                target = %target,
                                status = response.status().as_u16(),
                                attempt = number,
                                upstream_request_id = %attempt.request_id,
                                duration_ms,
                                "Upstream responded"
                            );
                        }
                        Err(failure) => {
                            metrics::record_attempt(service, failure.label());
                            tracing::warn!(
                                method = %method,
                                target = %target,
                                error = %failure,
                                attempt = number,
                                upstream_request_id = %attempt.request_id,
                                duration_ms,
                                "Upstream attempt failed"
                            );
                        }
                    }
                    result
                }
            })
            .await;

        match result {
            Ok(response) => Ok(relay(response)),
            Err(failure) => {
                tracing::error!(error = %failure, "Giving up on upstream");
                Err(terminal_error(service, failure))
            }
        }
    }

    fn authenticate(
        &self,
        rule: &RouteRule,
        request: &Request<Body>,
    ) -> Result<Option<Principal>, GatewayError> {
        if !rule.requires_auth {
            return Ok(None);
        }
        match self.resolver.resolve_headers(request.headers()) {
            Ok(principal) => Ok(Some(principal)),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected unauthenticated request");
                Err(e.into())
            }
        }
    }
}

/// Timeout → 504, anything else → 503.
fn terminal_error(service: &str, failure: DispatchFailure) -> GatewayError {
    let service = service.to_string();
    if failure.is_timeout() {
        return GatewayError::Timeout { service };
    }
    match failure {
        DispatchFailure::Transport(source) => GatewayError::Unavailable { service, source },
        DispatchFailure::PoolExhausted { service } => GatewayError::PoolExhausted { service },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{TransportError, TransportErrorKind};
    use axum::http::StatusCode;

    fn engine() -> ProxyEngine {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = "secret".into();
        config.set_all_service_urls("http://127.0.0.1:9");
        let routes = Arc::new(RouteTable::from_config(&config));
        let registry = Arc::new(
            ServiceRegistry::new(&config.services, config.health_check.unhealthy_threshold).unwrap(),
        );
        ProxyEngine::new(&config, routes, registry)
    }

    fn client() -> ClientContext {
        ClientContext { peer: None, tls: false }
    }

    #[tokio::test]
    async fn unknown_path_is_404_with_routes() {
        let engine = engine();
        let request = Request::builder().uri("/nope/xyz").body(Body::empty()).unwrap();
        let err = engine.handle(request, client(), AbortSignal::new()).await.unwrap_err();
        match err {
            GatewayError::RouteNotFound { available, .. } => assert_eq!(available.len(), 9),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn protected_route_without_token_is_401() {
        let engine = engine();
        let request = Request::builder().uri("/api/todos").body(Body::empty()).unwrap();
        let err = engine.handle(request, client(), AbortSignal::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(engine.registry().get("todo").unwrap().health.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn open_breaker_fails_fast_without_counting() {
        let engine = engine();
        for _ in 0..3 {
            engine.registry().update_health("auth", crate::health::Outcome::Failure);
        }
        let request = Request::builder().uri("/api/auth/login").body(Body::empty()).unwrap();
        let err = engine.handle(request, client(), AbortSignal::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen { .. }));
        assert_eq!(engine.registry().get("auth").unwrap().health.consecutive_failures, 3);
    }

    #[test]
    fn terminal_errors_map_by_kind() {
        let timeout = DispatchFailure::Transport(TransportError::new(TransportErrorKind::Timeout, "slow"));
        assert_eq!(terminal_error("todo", timeout).status(), StatusCode::GATEWAY_TIMEOUT);

        let reset = DispatchFailure::Transport(TransportError::new(TransportErrorKind::ConnectionReset, "reset"));
        assert_eq!(terminal_error("todo", reset).status(), StatusCode::SERVICE_UNAVAILABLE);

        let full = DispatchFailure::PoolExhausted { service: "todo".into() };
        assert_eq!(terminal_error("todo", full).status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

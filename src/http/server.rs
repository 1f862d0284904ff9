//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener (plain or TLS)
//! - Dispatch proxied requests to the engine in their own task, under the
//!   overall request deadline
//! - Start the health monitor alongside the server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::{any, get},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::cache::CacheProbe;
use crate::config::{GatewayConfig, WebSocketConfig};
use crate::error::GatewayError;
use crate::health::HealthMonitor;
use crate::http::request::{client_context, RequestIdExt};
use crate::http::status::{docs_handler, health_handler};
use crate::http::websocket::websocket_handler;
use crate::lifecycle::Shutdown;
use crate::proxy::ProxyEngine;
use crate::registry::{RegistryError, ServiceRegistry};
use crate::resilience::AbortSignal;
use crate::routing::RouteTable;

/// Grace period for in-flight requests on TLS shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProxyEngine>,
    pub registry: Arc<ServiceRegistry>,
    pub websocket: Arc<WebSocketConfig>,
    pub cache: Option<Arc<CacheProbe>>,
    pub expose_errors: bool,
    pub tls: bool,
    /// Overall deadline for one proxied request, retries included.
    pub request_timeout: Duration,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    registry: Arc<ServiceRegistry>,
}

impl GatewayServer {
    /// Create a new gateway server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, RegistryError> {
        let registry = Arc::new(ServiceRegistry::new(
            &config.services,
            config.health_check.unhealthy_threshold,
        )?);
        let routes = Arc::new(RouteTable::from_config(&config));
        let engine = Arc::new(ProxyEngine::new(&config, routes, registry.clone()));

        let cache = match CacheProbe::from_config(&config.cache) {
            Ok(probe) => Some(Arc::new(probe)),
            Err(e) => {
                tracing::warn!(url = %config.cache.url, error = %e, "Invalid cache url, reporting disconnected");
                None
            }
        };

        let state = AppState {
            engine,
            registry: registry.clone(),
            websocket: Arc::new(config.websocket.clone()),
            cache,
            expose_errors: config.security.expose_error_details,
            tls: config.listener.tls.is_some(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            registry,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/docs", get(docs_handler));

        if config.websocket.enabled {
            let path = config.websocket.path.trim_end_matches('/');
            router = router
                .route(path, any(websocket_handler))
                .route(&format!("{}/{{*rest}}", path), any(websocket_handler));
        }

        router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Shared health state, for callers that drive the monitor themselves.
    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    fn spawn_health_monitor(&self, shutdown: &Shutdown) {
        let monitor = HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            monitor.run(rx).await;
        });
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_health_monitor(shutdown);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut rx = shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_health_monitor(shutdown);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        let mut rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = rx.recv().await;
            tracing::info!("HTTPS server draining");
            drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Proxy handler for every path not served by the gateway itself.
///
/// The engine runs in its own task so that a client disconnect, which
/// drops this future, cannot cancel an in-flight upstream attempt. The
/// guard raises the abort flag in that case so no retry follows. Running
/// past the request deadline is treated the same way and answers 504.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client = client_context(&request, state.tls);
    let path = request.uri().path().to_string();
    let abort = AbortSignal::new();
    let guard = abort.guard();

    let engine = state.engine.clone();
    let task = tokio::spawn(
        async move { engine.handle(request, client, abort).await }.instrument(tracing::Span::current()),
    );

    let joined = match tokio::time::timeout(state.request_timeout, task).await {
        Ok(joined) => joined,
        Err(_) => {
            drop(guard);
            let service = state
                .engine
                .routes()
                .match_path(&path)
                .map(|rule| rule.service.clone())
                .unwrap_or_else(|| "gateway".to_string());
            tracing::warn!(
                service = %service,
                timeout_secs = state.request_timeout.as_secs(),
                "Request deadline exceeded"
            );
            return GatewayError::Timeout { service }.into_response_with(state.expose_errors);
        }
    };
    guard.disarm();

    match joined {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => e.into_response_with(state.expose_errors),
        Err(e) => {
            tracing::error!(error = %e, "Proxy task failed");
            GatewayError::Internal(e.to_string()).into_response_with(state.expose_errors)
        }
    }
}

//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered service
//! - Update service health in the registry based on results

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::state::Outcome;
use crate::registry::{ServiceDescriptor, ServiceRegistry};

pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ServiceRegistry>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            registry,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every service once, concurrently.
    pub async fn check_all(&self) {
        let services = self.registry.snapshot();
        let probes = services.iter().map(|service| async move {
            let outcome = self.probe(service).await;
            self.registry.update_health(&service.name, outcome);
        });
        join_all(probes).await;
    }

    async fn probe(&self, service: &ServiceDescriptor) -> Outcome {
        let uri = service.upstream_uri(&self.config.path);

        let request = match Request::builder()
            .method("GET")
            .uri(&uri)
            .header("user-agent", "service-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(service = %service.name, uri = %uri, "Failed to build health check request: {}", e);
                return Outcome::Failure;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                if response.status().is_success() {
                    tracing::debug!(service = %service.name, status = %response.status(), "Health check passed");
                    Outcome::Success
                } else {
                    tracing::warn!(service = %service.name, status = %response.status(), "Health check failed: non-success status");
                    Outcome::Failure
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %service.name, error = %e, "Health check failed: connection error");
                Outcome::Failure
            }
            Err(_) => {
                tracing::warn!(service = %service.name, "Health check failed: timeout");
                Outcome::Failure
            }
        }
    }
}

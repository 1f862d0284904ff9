//! Per-service upstream connection pools.
//!
//! # Responsibilities
//! - Own one keep-alive HTTP client per service
//! - Cap concurrent upstream requests at `max_sockets`
//! - Queue dispatches while the pool is full, within bounds
//!
//! # Design Decisions
//! - A socket permit is held until the response body is fully streamed
//! - The queue is bounded by both length and wait time; overflow is
//!   `PoolExhausted`, which never touches health
//! - When several routes target one service the largest limits win

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::StreamExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::proxy::failure::DispatchFailure;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::TransportError;
use crate::routing::RouteRule;

/// Socket limits for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_sockets: usize,
    pub max_free_sockets: usize,
}

#[derive(Debug)]
pub struct UpstreamPool {
    service: String,
    client: Client<HttpConnector, Body>,
    permits: Arc<Semaphore>,
    waiting: AtomicUsize,
    limits: PoolLimits,
    max_queued: usize,
    queue_timeout: Duration,
}

impl UpstreamPool {
    pub fn new(service: impl Into<String>, limits: PoolLimits, config: &PoolConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(limits.max_free_sockets)
            .build(connector);

        Self {
            service: service.into(),
            client,
            permits: Arc::new(Semaphore::new(limits.max_sockets)),
            waiting: AtomicUsize::new(0),
            limits,
            max_queued: config.max_queued,
            queue_timeout: Duration::from_millis(config.queue_timeout_ms),
        }
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Sockets currently checked out.
    pub fn in_use(&self) -> usize {
        self.limits.max_sockets - self.permits.available_permits()
    }

    /// Wait for a free socket slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, DispatchFailure> {
        if let Ok(permit) = self.permits.clone().try_acquire_owned() {
            return Ok(permit);
        }

        let Some(_queued) = QueueGuard::enter(&self.waiting, self.max_queued) else {
            tracing::warn!(service = %self.service, queued = self.max_queued, "Upstream queue full");
            return Err(self.exhausted());
        };

        match tokio::time::timeout(self.queue_timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(self.exhausted()),
            Err(_) => {
                tracing::warn!(
                    service = %self.service,
                    waited_ms = self.queue_timeout.as_millis() as u64,
                    "Timed out waiting for an upstream socket"
                );
                Err(self.exhausted())
            }
        }
    }

    /// Send one request, waiting at most `timeout` for the response head.
    ///
    /// The returned body keeps the socket permit until it is dropped or
    /// fully consumed.
    pub async fn send(
        &self,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<Response<Body>, DispatchFailure> {
        let permit = self.acquire().await?;

        let response = with_deadline(timeout, async {
            self.client
                .request(request)
                .await
                .map_err(|e| TransportError::from_client_error(&e))
        })
        .await?;

        let (parts, incoming) = response.into_parts();
        let stream = Body::new(incoming).into_data_stream().map(move |chunk| {
            let _held = &permit;
            chunk
        });
        Ok(Response::from_parts(parts, Body::from_stream(stream)))
    }

    fn exhausted(&self) -> DispatchFailure {
        DispatchFailure::PoolExhausted {
            service: self.service.clone(),
        }
    }
}

/// Counts a waiting dispatch for as long as it is alive.
struct QueueGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> QueueGuard<'a> {
    fn enter(waiting: &'a AtomicUsize, max_queued: usize) -> Option<Self> {
        let mut prev = waiting.load(Ordering::Relaxed);
        loop {
            if prev >= max_queued {
                return None;
            }
            match waiting.compare_exchange_weak(prev, prev + 1, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Some(Self { waiting }),
                Err(x) => prev = x,
            }
        }
    }
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Pools keyed by service name.
#[derive(Debug, Default)]
pub struct UpstreamPools {
    pools: HashMap<String, Arc<UpstreamPool>>,
}

impl UpstreamPools {
    pub fn from_rules(rules: &[RouteRule], config: &PoolConfig) -> Self {
        let mut limits: HashMap<&str, PoolLimits> = HashMap::new();
        for rule in rules {
            let entry = limits.entry(rule.service.as_str()).or_insert(PoolLimits {
                max_sockets: rule.max_sockets,
                max_free_sockets: rule.max_free_sockets,
            });
            entry.max_sockets = entry.max_sockets.max(rule.max_sockets);
            entry.max_free_sockets = entry.max_free_sockets.max(rule.max_free_sockets);
        }

        let pools = limits
            .into_iter()
            .map(|(service, limits)| {
                (
                    service.to_string(),
                    Arc::new(UpstreamPool::new(service, limits, config)),
                )
            })
            .collect();

        Self { pools }
    }

    pub fn get(&self, service: &str) -> Option<Arc<UpstreamPool>> {
        self.pools.get(service).cloned()
    }
}

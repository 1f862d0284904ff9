//! Circuit breaker for service protection.
//!
//! # States
//! - Closed: service Healthy, requests pass through
//! - Open: service Unhealthy, requests fail fast with 503
//!
//! # State Transitions
//! ```text
//! Closed → Open: registry marks the service Unhealthy
//! Open → Closed: any probe or in-flight request gets a response
//! ```
//!
//! # Design Decisions
//! - Per-service breaker, derived from the registry's health record
//! - Fail fast in Open state; a rejection is not counted as a failure
//! - No half-open probe state: recovery comes from the health monitor or
//!   from attempts admitted before the breaker opened

use std::sync::Arc;

use crate::health::state::HealthStatus;
use crate::observability::metrics;
use crate::registry::ServiceRegistry;

/// Routing decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Rejected,
}

/// Fail-fast guard in front of every dispatch.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    registry: Arc<ServiceRegistry>,
}

impl CircuitBreaker {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Rejected iff the service is Unhealthy (or unknown).
    pub fn allow(&self, service: &str) -> Decision {
        match self.registry.status(service) {
            Some(HealthStatus::Healthy) => Decision::Allowed,
            Some(HealthStatus::Unhealthy) => {
                metrics::record_breaker_rejection(service);
                Decision::Rejected
            }
            None => {
                tracing::error!(service = %service, "Breaker consulted for unregistered service");
                Decision::Rejected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::health::state::Outcome;

    fn breaker() -> (CircuitBreaker, Arc<ServiceRegistry>) {
        let registry = Arc::new(
            ServiceRegistry::new(
                &[ServiceConfig {
                    name: "chat".into(),
                    url: "http://127.0.0.1:3003".into(),
                }],
                3,
            )
            .unwrap(),
        );
        (CircuitBreaker::new(registry.clone()), registry)
    }

    #[test]
    fn opens_with_registry_and_recovers() {
        let (breaker, registry) = breaker();
        assert_eq!(breaker.allow("chat"), Decision::Allowed);

        registry.update_health("chat", Outcome::Failure);
        registry.update_health("chat", Outcome::Failure);
        assert_eq!(breaker.allow("chat"), Decision::Allowed);

        registry.update_health("chat", Outcome::Failure);
        assert_eq!(breaker.allow("chat"), Decision::Rejected);

        // Rejections do not touch the health record.
        let before = registry.get("chat").unwrap().health;
        assert_eq!(breaker.allow("chat"), Decision::Rejected);
        assert_eq!(registry.get("chat").unwrap().health, before);

        registry.update_health("chat", Outcome::Success);
        assert_eq!(breaker.allow("chat"), Decision::Allowed);
    }

    #[test]
    fn unknown_service_is_rejected() {
        let (breaker, _) = breaker();
        assert_eq!(breaker.allow("ghost"), Decision::Rejected);
    }
}

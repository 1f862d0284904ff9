//! Service registry.
//!
//! # Responsibilities
//! - Map logical service names to base URLs (static after startup)
//! - Own the mutable health record of every service
//! - Apply outcomes from the health monitor and the proxy engine

use std::collections::BTreeMap;

use chrono::Utc;
use dashmap::DashMap;
use url::Url;

use crate::config::ServiceConfig;
use crate::health::state::{HealthRecord, HealthStatus, Outcome};
use crate::observability::metrics;
use crate::registry::descriptor::ServiceDescriptor;

/// Error raised while building the registry from configuration.
#[derive(Debug, thiserror::Error)]
#[error("service '{name}' has invalid url: {source}")]
pub struct RegistryError {
    pub name: String,
    #[source]
    pub source: url::ParseError,
}

/// Static service table decorated with live health records.
///
/// Shared via `Arc` between the health monitor, circuit breaker and proxy
/// engine. Each health update is a read-modify-write under the entry lock,
/// so concurrent updates to one service are applied one at a time.
#[derive(Debug)]
pub struct ServiceRegistry {
    /// Ordered so health reports list services deterministically.
    addresses: BTreeMap<String, Url>,
    health: DashMap<String, HealthRecord>,
    unhealthy_threshold: u32,
}

impl ServiceRegistry {
    /// Build the registry from configuration. Every service starts Healthy.
    pub fn new(
        services: &[ServiceConfig],
        unhealthy_threshold: u32,
    ) -> Result<Self, RegistryError> {
        let mut addresses = BTreeMap::new();
        let health = DashMap::new();

        for service in services {
            let url = Url::parse(&service.url).map_err(|source| RegistryError {
                name: service.name.clone(),
                source,
            })?;
            addresses.insert(service.name.clone(), url);
            health.insert(service.name.clone(), HealthRecord::default());
            metrics::record_service_health(&service.name, true);
        }

        Ok(Self {
            addresses,
            health,
            unhealthy_threshold,
        })
    }

    /// Snapshot of a service and its current health.
    pub fn get(&self, name: &str) -> Option<ServiceDescriptor> {
        let base_url = self.addresses.get(name)?.clone();
        let health = self
            .health
            .get(name)
            .map(|r| r.value().clone())
            .unwrap_or_default();

        Some(ServiceDescriptor {
            name: name.to_string(),
            base_url,
            health,
        })
    }

    /// Current status of a service, if registered.
    pub fn status(&self, name: &str) -> Option<HealthStatus> {
        self.health.get(name).map(|r| r.status)
    }

    /// Whether a service name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.addresses.contains_key(name)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.addresses.keys().map(String::as_str)
    }

    /// Snapshots of every service, sorted by name.
    pub fn snapshot(&self) -> Vec<ServiceDescriptor> {
        self.names().filter_map(|name| self.get(name)).collect()
    }

    /// Record the outcome of a probe or forwarding attempt.
    ///
    /// Never fails: names are validated at startup, so an unknown name here
    /// is only logged.
    pub fn update_health(&self, name: &str, outcome: Outcome) {
        let Some(mut record) = self.health.get_mut(name) else {
            tracing::error!(service = %name, "Health update for unregistered service");
            return;
        };

        let transition = record.apply(outcome, self.unhealthy_threshold, Utc::now());
        let failures = record.consecutive_failures;
        drop(record);

        match transition {
            Some(HealthStatus::Unhealthy) => {
                tracing::warn!(service = %name, consecutive_failures = failures, "Service marked unhealthy");
                metrics::record_service_health(name, false);
            }
            Some(HealthStatus::Healthy) => {
                tracing::info!(service = %name, "Service recovered");
                metrics::record_service_health(name, true);
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(
            &[
                ServiceConfig {
                    name: "todo".into(),
                    url: "http://127.0.0.1:3005".into(),
                },
                ServiceConfig {
                    name: "auth".into(),
                    url: "http://127.0.0.1:3001".into(),
                },
            ],
            3,
        )
        .unwrap()
    }

    #[test]
    fn starts_healthy() {
        let registry = registry();
        let todo = registry.get("todo").unwrap();
        assert!(todo.is_healthy());
        assert_eq!(todo.health.consecutive_failures, 0);
        assert!(todo.health.last_checked_at.is_none());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn failures_are_per_service() {
        let registry = registry();
        for _ in 0..3 {
            registry.update_health("todo", Outcome::Failure);
        }
        assert_eq!(registry.status("todo"), Some(HealthStatus::Unhealthy));
        assert_eq!(registry.status("auth"), Some(HealthStatus::Healthy));

        registry.update_health("todo", Outcome::Success);
        let todo = registry.get("todo").unwrap();
        assert!(todo.is_healthy());
        assert_eq!(todo.health.consecutive_failures, 0);
        assert!(todo.health.last_checked_at.is_some());
    }

    #[test]
    fn unknown_service_update_is_ignored() {
        let registry = registry();
        registry.update_health("ghost", Outcome::Failure);
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn snapshot_is_sorted() {
        let names: Vec<_> = registry().snapshot().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["auth", "todo"]);
    }

    #[test]
    fn rejects_bad_url() {
        let err = ServiceRegistry::new(
            &[ServiceConfig {
                name: "bad".into(),
                url: "::nope".into(),
            }],
            3,
        )
        .unwrap_err();
        assert_eq!(err.name, "bad");
    }
}

//! Service abstraction.
//!
//! # Responsibilities
//! - Represent a single backend service (name + base URL)
//! - Carry a snapshot of its health record

use url::Url;

use crate::health::state::{HealthRecord, HealthStatus};

/// A registered backend service with a point-in-time health snapshot.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Unique logical name.
    pub name: String,
    /// Base URL requests are forwarded to.
    pub base_url: Url,
    /// Health at the time the snapshot was taken.
    pub health: HealthRecord,
}

impl ServiceDescriptor {
    pub fn is_healthy(&self) -> bool {
        self.health.status == HealthStatus::Healthy
    }

    /// Join an absolute path-and-query onto the base URL.
    ///
    /// The base URL may carry its own path prefix (e.g. `http://host/svc`).
    pub fn upstream_uri(&self, path_and_query: &str) -> String {
        join_base(&self.base_url, path_and_query)
    }
}

pub(crate) fn join_base(base: &Url, path_and_query: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    if path_and_query.starts_with('/') {
        format!("{}{}", base, path_and_query)
    } else {
        format!("{}/{}", base, path_and_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(url: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            name: "todo".into(),
            base_url: Url::parse(url).unwrap(),
            health: HealthRecord::default(),
        }
    }

    #[test]
    fn joins_without_double_slash() {
        let d = descriptor("http://todo:3005");
        assert_eq!(d.upstream_uri("/api/todos?x=1"), "http://todo:3005/api/todos?x=1");

        let d = descriptor("http://todo:3005/");
        assert_eq!(d.upstream_uri("/health"), "http://todo:3005/health");
    }

    #[test]
    fn keeps_base_path() {
        let d = descriptor("http://gateway.internal/todo/");
        assert_eq!(d.upstream_uri("/health"), "http://gateway.internal/todo/health");
    }
}

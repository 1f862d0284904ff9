//! Service health state machine.
//!
//! # States
//! - Healthy: service receives traffic
//! - Unhealthy: circuit breaker rejects new dispatches
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: the next transport-successful response
//! ```
//!
//! # Design Decisions
//! - No hysteresis: a single success restores the service
//! - Any response the upstream sends is a success, whatever its status
//! - State changes are reported to the caller for logging

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }
}

/// Result of one probe or forwarding attempt, as seen by health accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The upstream produced a response (any status code).
    Success,
    /// Transport-level failure: refused, reset, timeout, DNS.
    Failure,
}

/// Mutable health record attached to each registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            status: HealthStatus::Healthy,
            consecutive_failures: 0,
            last_checked_at: None,
        }
    }
}

impl HealthRecord {
    /// Apply an outcome. Returns the new status if it changed.
    pub fn apply(
        &mut self,
        outcome: Outcome,
        unhealthy_threshold: u32,
        now: DateTime<Utc>,
    ) -> Option<HealthStatus> {
        let previous = self.status;
        self.last_checked_at = Some(now);

        match outcome {
            Outcome::Success => {
                self.consecutive_failures = 0;
                self.status = HealthStatus::Healthy;
            }
            Outcome::Failure => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= unhealthy_threshold {
                    self.status = HealthStatus::Unhealthy;
                }
            }
        }

        (previous != self.status).then_some(self.status)
    }
}

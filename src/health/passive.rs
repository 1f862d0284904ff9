//! Passive health checking (request outcome accounting).
//!
//! # Responsibilities
//! - Observe the outcome of every completed forwarding attempt
//! - Feed it into the registry exactly once per attempt
//!
//! # Design Decisions
//! - Any upstream response is a success, including 4xx and 5xx
//! - Connection errors and timeouts are failures
//! - Failures that never reached the upstream (breaker rejection, local
//!   pool exhaustion) are not counted

use crate::health::state::Outcome;
use crate::registry::ServiceRegistry;
use crate::resilience::TransportError;

/// Whether a failed attempt says anything about upstream health.
pub trait HealthSignal {
    fn counts_as_failure(&self) -> bool;
}

impl HealthSignal for TransportError {
    fn counts_as_failure(&self) -> bool {
        true
    }
}

/// Classify an attempt result and record it against `service`.
///
/// Returns the recorded outcome, or `None` when nothing was recorded.
pub fn observe<T, E: HealthSignal>(
    registry: &ServiceRegistry,
    service: &str,
    result: &Result<T, E>,
) -> Option<Outcome> {
    let outcome = match result {
        Ok(_) => Outcome::Success,
        Err(e) if e.counts_as_failure() => Outcome::Failure,
        Err(_) => return None,
    };
    registry.update_health(service, outcome);
    Some(outcome)
}

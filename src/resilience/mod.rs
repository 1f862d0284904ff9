//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to service:
//!     → circuit_breaker.rs (fail fast if the service is Unhealthy)
//!     → timeouts.rs (enforce the route's per-attempt deadline)
//!     → transport.rs (classify any failure)
//!     → On transient failure: retries.rs (linear backoff, bounded attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Only transport failures are retried, never upstream responses
//! - Circuit breaker prevents hammering services already known to be down
//! - Retry is a wrapper around a single dispatch, composable with any attempt

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;
pub mod transport;

pub use circuit_breaker::{CircuitBreaker, Decision};
pub use retries::{AbortSignal, RetryPolicy, Retryable};
pub use transport::{TransportError, TransportErrorKind};

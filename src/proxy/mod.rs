//! Proxy engine subsystem.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → engine.rs (route, authenticate, breaker, prepare)
//!     → RetryPolicy::run
//!         → attempt.rs (fresh X-Request-ID)
//!         → pool.rs (socket permit, keep-alive client, deadline)
//!         → failure.rs (classify, retryable?, counts against health?)
//!     → relayed response or GatewayError
//! ```

pub mod attempt;
pub mod engine;
pub mod failure;
pub mod pool;

pub use attempt::ProxyAttempt;
pub use engine::ProxyEngine;
pub use failure::DispatchFailure;
pub use pool::{PoolLimits, UpstreamPool, UpstreamPools};

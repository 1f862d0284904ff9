//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (30s)
//!     → Probe every service concurrently (10s timeout each)
//!     → Update the registry
//!
//! Passive health checks (passive.rs):
//!     Forwarding attempt completes
//!     → Success (any response) or Failure (transport error)
//!     → Update the registry
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - Unhealthy after consecutive failures, Healthy after one success
//! - Health state is per-service

pub mod active;
pub mod passive;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthRecord, HealthStatus, Outcome};

//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceConfig[] (startup)
//!     → service_registry.rs (name → base URL, health record per service)
//!
//! Writers:                      Readers:
//!     health monitor probes         circuit breaker (allow?)
//!     proxy attempt outcomes        gateway /health report
//! ```
//!
//! # Design Decisions
//! - Owned by the process and passed around as `Arc`, never global
//! - Addresses are immutable; only health records change
//! - Snapshots are cloned out so no lock is held across await points

pub mod descriptor;
pub mod service_registry;

pub use descriptor::ServiceDescriptor;
pub use service_registry::{RegistryError, ServiceRegistry};

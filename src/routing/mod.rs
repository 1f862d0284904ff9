//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup, longest prefix first)
//!     → rule.rs (segment-boundary prefix match, path rewrite)
//!     → Return: matched RouteRule or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + ServiceConfig[]
//!     → API rules + generated /health/<service> passthroughs
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod router;
pub mod rule;

pub use router::RouteTable;
pub use rule::{RouteKind, RouteRule};

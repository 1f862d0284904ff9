//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (bounded body buffering)
//!     → headers.rs (sanitize, strip identity, add X-Forwarded-*)
//!     → Pass to the proxy engine
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod headers;
pub mod limits;

pub use headers::{strip_hop_by_hop, upstream_headers, ClientContext};
pub use limits::{read_limited, BodyError};

//! Principal resolution for protected routes.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → resolver.rs (HS256 signature, optional exp)
//!     → principal.rs (claims → sanitised Principal)
//!     → X-User-ID / X-User-Role on the upstream request
//! ```
//!
//! # Design Decisions
//! - Resolution happens before the circuit breaker, so a 401 never depends
//!   on backend health
//! - Identity headers from the client are always stripped

pub mod principal;
pub mod resolver;

pub use principal::{strip_identity_headers, Claims, Principal};
pub use resolver::{AuthError, PrincipalResolver};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → /health, /api/docs → status.rs
//!     → /ws[/...]          → websocket.rs (upgrade + relay)
//!     → anything else      → proxy engine
//!     → response.rs (hop-by-hop stripping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod status;
pub mod websocket;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};

//! Service gateway library.
//!
//! A single entry point in front of a fleet of HTTP micro-services:
//! prefix routing, JWT principal propagation, per-service health and
//! circuit breaking, bounded retries and a WebSocket tunnel.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod registry;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;

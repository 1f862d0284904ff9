//! Request handling helpers.
//!
//! # Responsibilities
//! - Name the correlation header
//! - Expose the inbound request ID for logging
//! - Capture where the request came from (peer, TLS)
//!
//! # Design Decisions
//! - The inbound ID is assigned by `SetRequestIdLayer` as early as possible
//! - Upstream attempts get their own IDs; the inbound one stays client-side

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderName, Request};

use crate::security::ClientContext;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub trait RequestIdExt {
    /// Inbound correlation ID, or `"unknown"`.
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Build the client context from connection info recorded by the server.
pub fn client_context<B>(request: &Request<B>, tls: bool) -> ClientContext {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    ClientContext { peer, tls }
}

//! Response handling.
//!
//! # Responsibilities
//! - Relay the upstream response to the client
//! - Strip hop-by-hop headers
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Status and end-to-end headers pass through verbatim

use axum::body::Body;
use axum::http::Response;

use crate::security::strip_hop_by_hop;

/// Turn an upstream response into the client response.
pub fn relay(response: Response<Body>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};

    #[test]
    fn relay_keeps_status_and_end_to_end_headers() {
        let upstream = Response::builder()
            .status(StatusCode::IM_A_TEAPOT)
            .header(header::CONNECTION, "close")
            .header(header::CONTENT_TYPE, "text/plain")
            .header("x-backend", "todo")
            .body(Body::from("short and stout"))
            .unwrap();

        let relayed = relay(upstream);
        assert_eq!(relayed.status(), StatusCode::IM_A_TEAPOT);
        assert!(relayed.headers().get(header::CONNECTION).is_none());
        assert_eq!(relayed.headers().get("x-backend").unwrap(), "todo");
    }
}

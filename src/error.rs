//! Client-facing gateway errors.
//!
//! Every failure the gateway itself produces ends up here and is rendered
//! as `{ "error", "details"?, "timestamp", "availableRoutes"? }`.
//! Upstream responses never pass through this type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::auth::AuthError;
use crate::resilience::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Unauthorized(#[from] AuthError),

    #[error("Route not found")]
    RouteNotFound { path: String, available: Vec<String> },

    #[error("Service {service} temporarily unavailable")]
    CircuitOpen { service: String },

    #[error("Service {service} unavailable")]
    Unavailable {
        service: String,
        #[source]
        source: TransportError,
    },

    #[error("Service {service} timed out")]
    Timeout { service: String },

    #[error("Service {service} is at connection capacity")]
    PoolExhausted { service: String },

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Internal server error")]
    Internal(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_routes: Option<Vec<String>>,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::CircuitOpen { .. }
            | GatewayError::Unavailable { .. }
            | GatewayError::PoolExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the JSON error body.
    ///
    /// Internal details are only included when `expose_details` is set.
    pub fn into_response_with(self, expose_details: bool) -> Response {
        let status = self.status();
        let error = self.to_string();

        let (details, available_routes) = match self {
            GatewayError::RouteNotFound { path, available } => {
                (Some(format!("No route for {}", path)), Some(available))
            }
            GatewayError::Unavailable { source, .. } => (Some(source.kind.to_string()), None),
            GatewayError::Internal(detail) if expose_details => (Some(detail), None),
            _ => (None, None),
        };

        let body = ErrorBody {
            error,
            details,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            available_routes,
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::TransportErrorKind;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_lists_routes() {
        let response = GatewayError::RouteNotFound {
            path: "/nope/xyz".into(),
            available: vec!["/api/auth".into(), "/api/todos".into()],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["availableRoutes"].as_array().unwrap().len(), 2);
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn transport_failures_map_to_5xx() {
        let unavailable = GatewayError::Unavailable {
            service: "todo".into(),
            source: TransportError::new(TransportErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let timeout = GatewayError::Timeout { service: "todo".into() };
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let body = body_json(unavailable.into_response()).await;
        assert_eq!(body["error"], "Service todo unavailable");
        assert!(body.get("availableRoutes").is_none());
    }

    #[tokio::test]
    async fn internal_details_hidden_unless_exposed() {
        let hidden = body_json(GatewayError::Internal("task panicked".into()).into_response()).await;
        assert!(hidden.get("details").is_none());

        let shown =
            body_json(GatewayError::Internal("task panicked".into()).into_response_with(true)).await;
        assert_eq!(shown["details"], "task panicked");
    }

    #[test]
    fn auth_errors_are_401() {
        let err: GatewayError = AuthError::MissingToken.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}

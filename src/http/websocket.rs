//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Establish the WebSocket connection to the backend first
//! - Complete the upgrade handshake with the client only on success
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - No breaker gate and no retry; the handshake outcome still feeds health
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - Ping/pong forwarded as-is
//! - Either side ending tears down both

use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame as AxumCloseFrame, Message as AxumMessage, WebSocket, WebSocketUpgrade},
        OriginalUri, State,
    },
    http::{header, HeaderMap, HeaderName, StatusCode, Uri},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        protocol::{frame::coding::CloseCode, CloseFrame as UpstreamCloseFrame},
        Message as UpstreamMessage,
    },
    MaybeTlsStream, WebSocketStream,
};
use url::Url;
use uuid::Uuid;

use crate::config::WebSocketConfig;
use crate::error::GatewayError;
use crate::health::Outcome;
use crate::http::request::X_REQUEST_ID;
use crate::http::server::AppState;
use crate::registry::descriptor::join_base;
use crate::resilience::{TransportError, TransportErrorKind};
use crate::security::headers::X_FORWARDED_FOR;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client headers carried over to the upstream handshake.
const FORWARDED_HEADERS: [HeaderName; 4] = [
    header::AUTHORIZATION,
    header::COOKIE,
    header::SEC_WEBSOCKET_PROTOCOL,
    header::USER_AGENT,
];

pub async fn websocket_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let config = &state.websocket;
    let service = config.service.as_str();

    let Some(descriptor) = state.registry.get(service) else {
        return GatewayError::Internal(format!("websocket service {} is not registered", service))
            .into_response_with(state.expose_errors);
    };

    let target = match upstream_url(&descriptor.base_url, config, &uri) {
        Ok(target) => target,
        Err(e) => return e.into_response_with(state.expose_errors),
    };

    let timeout = Duration::from_millis(config.connect_timeout_ms);
    let (upstream, protocol) = match connect_upstream(&target, &headers, timeout).await {
        Ok(connected) => {
            state.registry.update_health(service, Outcome::Success);
            connected
        }
        Err(HandshakeError::Rejected(status)) => {
            // Any answer from the upstream counts as alive.
            state.registry.update_health(service, Outcome::Success);
            tracing::warn!(service = %service, target = %target, status = %status, "Upstream refused WebSocket upgrade");
            let source = TransportError::new(
                TransportErrorKind::Other,
                format!("upgrade refused with status {}", status),
            );
            return GatewayError::Unavailable {
                service: service.to_string(),
                source,
            }
            .into_response_with(state.expose_errors);
        }
        Err(HandshakeError::Transport(e)) => {
            state.registry.update_health(service, Outcome::Failure);
            tracing::warn!(service = %service, target = %target, error = %e, "WebSocket upstream unreachable");
            let err = if e.kind == TransportErrorKind::Timeout {
                GatewayError::Timeout {
                    service: service.to_string(),
                }
            } else {
                GatewayError::Unavailable {
                    service: service.to_string(),
                    source: e,
                }
            };
            return err.into_response_with(state.expose_errors);
        }
    };

    tracing::info!(service = %service, target = %target, "WebSocket tunnel established");

    let ws = match protocol {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };
    let service = service.to_string();
    ws.on_upgrade(move |socket| async move {
        relay(socket, upstream).await;
        tracing::info!(service = %service, "WebSocket tunnel closed");
    })
}

/// `ws://<service>/<upstream_path><rest>?<query>` for a client request
/// on `<path><rest>`.
pub fn upstream_url(base: &Url, config: &WebSocketConfig, uri: &Uri) -> Result<String, GatewayError> {
    let mut ws_base = base.clone();
    ws_base
        .set_scheme("ws")
        .map_err(|_| GatewayError::Internal(format!("cannot derive websocket url from {}", base)))?;

    let prefix = config.path.trim_end_matches('/');
    let rest = uri.path().strip_prefix(prefix).unwrap_or("");
    let mut path = format!("{}{}", config.upstream_path.trim_end_matches('/'), rest);
    if path.is_empty() {
        path.push('/');
    }
    if let Some(query) = uri.query() {
        path.push('?');
        path.push_str(query);
    }

    Ok(join_base(&ws_base, &path))
}

enum HandshakeError {
    /// Upstream answered the handshake with a non-101 status.
    Rejected(StatusCode),
    Transport(TransportError),
}

async fn connect_upstream(
    target: &str,
    client_headers: &HeaderMap,
    timeout: Duration,
) -> Result<(UpstreamSocket, Option<String>), HandshakeError> {
    let mut request = target.into_client_request().map_err(|e| {
        HandshakeError::Transport(TransportError::new(TransportErrorKind::Other, e.to_string()))
    })?;

    let headers = request.headers_mut();
    for name in FORWARDED_HEADERS {
        for value in client_headers.get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }
    if let Ok(id) = Uuid::new_v4().to_string().parse() {
        headers.insert(X_REQUEST_ID, id);
    }
    if let Some(forwarded) = client_headers.get(X_FORWARDED_FOR) {
        headers.insert(X_FORWARDED_FOR, forwarded.clone());
    }

    let (socket, response) = match tokio::time::timeout(timeout, connect_async(request)).await {
        Ok(Ok(connected)) => connected,
        Ok(Err(tungstenite::Error::Http(response))) => {
            return Err(HandshakeError::Rejected(response.status()));
        }
        Ok(Err(e)) => return Err(HandshakeError::Transport(TransportError::from_error(&e))),
        Err(_) => return Err(HandshakeError::Transport(TransportError::timeout(timeout))),
    };

    let protocol = response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok((socket, protocol))
}

async fn relay(client: WebSocket, upstream: UpstreamSocket) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(msg) = client_rx.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, "Client socket error");
                    break;
                }
            };
            let closing = matches!(msg, AxumMessage::Close(_));
            if let Err(e) = upstream_tx.send(to_upstream(msg)).await {
                tracing::debug!(error = %e, "Upstream send failed");
                break;
            }
            if closing {
                break;
            }
        }
    };

    let upstream_to_client = async {
        while let Some(msg) = upstream_rx.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, "Upstream socket error");
                    break;
                }
            };
            let closing = matches!(msg, UpstreamMessage::Close(_));
            let Some(forward) = to_client(msg) else {
                continue;
            };
            if let Err(e) = client_tx.send(forward).await {
                tracing::debug!(error = %e, "Client send failed");
                break;
            }
            if closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }
}

fn to_upstream(msg: AxumMessage) -> UpstreamMessage {
    match msg {
        AxumMessage::Text(text) => UpstreamMessage::Text(text.to_string().into()),
        AxumMessage::Binary(data) => UpstreamMessage::Binary(data),
        AxumMessage::Ping(data) => UpstreamMessage::Ping(data),
        AxumMessage::Pong(data) => UpstreamMessage::Pong(data),
        AxumMessage::Close(frame) => UpstreamMessage::Close(frame.map(|f| UpstreamCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.to_string().into(),
        })),
    }
}

/// Raw frames never surface from a read; they are skipped.
fn to_client(msg: UpstreamMessage) -> Option<AxumMessage> {
    Some(match msg {
        UpstreamMessage::Text(text) => AxumMessage::Text(text.to_string().into()),
        UpstreamMessage::Binary(data) => AxumMessage::Binary(data),
        UpstreamMessage::Ping(data) => AxumMessage::Ping(data),
        UpstreamMessage::Pong(data) => AxumMessage::Pong(data),
        UpstreamMessage::Close(frame) => AxumMessage::Close(frame.map(|f| AxumCloseFrame {
            code: u16::from(f.code),
            reason: f.reason.to_string().into(),
        })),
        UpstreamMessage::Frame(_) => return None,
    })
}

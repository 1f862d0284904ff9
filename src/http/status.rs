//! Gateway-local endpoints.
//!
//! # Responsibilities
//! - `/health`: per-service health map plus cache connectivity
//! - `/api/docs`: static directory of proxied endpoints
//!
//! # Design Decisions
//! - `/health` reads registry snapshots only; it never probes services
//! - Always 200; degradation is reported in the body

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::health::HealthStatus;
use crate::http::server::AppState;
use crate::routing::RouteKind;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthView {
    pub status: HealthStatus,
    pub url: String,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub status: &'static str,
    pub timestamp: String,
    pub services: BTreeMap<String, ServiceHealthView>,
    pub cache: &'static str,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<GatewayHealth> {
    let services: BTreeMap<String, ServiceHealthView> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|d| {
            let view = ServiceHealthView {
                status: d.health.status,
                url: d.base_url.to_string(),
                consecutive_failures: d.health.consecutive_failures,
                last_checked_at: d.health.last_checked_at,
            };
            (d.name, view)
        })
        .collect();

    let cache_connected = match &state.cache {
        Some(probe) => probe.is_connected().await,
        None => false,
    };

    let all_healthy = services.values().all(|s| s.status.is_healthy());
    let status = if all_healthy && cache_connected {
        "healthy"
    } else {
        "degraded"
    };

    Json(GatewayHealth {
        status,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        services,
        cache: if cache_connected { "connected" } else { "disconnected" },
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDoc {
    pub path: String,
    pub service: String,
    pub requires_auth: bool,
    pub timeout_ms: u64,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ApiDocs {
    pub endpoints: Vec<EndpointDoc>,
    pub websocket: Option<String>,
    pub health: &'static str,
}

pub async fn docs_handler(State(state): State<AppState>) -> Json<ApiDocs> {
    let mut endpoints: Vec<EndpointDoc> = state
        .engine
        .routes()
        .rules()
        .iter()
        .map(|rule| EndpointDoc {
            path: if rule.kind == RouteKind::Api {
                format!("{}/*", rule.prefix)
            } else {
                rule.prefix.clone()
            },
            service: rule.service.clone(),
            requires_auth: rule.requires_auth,
            timeout_ms: rule.timeout.as_millis() as u64,
            description: rule.description.clone(),
        })
        .collect();
    endpoints.sort_by(|a, b| a.path.cmp(&b.path));

    Json(ApiDocs {
        endpoints,
        websocket: state
            .websocket
            .enabled
            .then(|| state.websocket.path.clone()),
        health: "/health",
    })
}

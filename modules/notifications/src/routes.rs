//! Notification HTTP API

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use event_bus::BrokerClient;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::log::NotificationLog;
use crate::models::Notification;

#[derive(Clone)]
pub struct AppState {
    pub log: Arc<NotificationLog>,
    pub broker: Arc<BrokerClient>,
    pub service_name: String,
}

impl AppState {
    pub fn new(
        log: Arc<NotificationLog>,
        broker: Arc<BrokerClient>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            log,
            broker,
            service_name: service_name.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/notifications", get(list_notifications))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub trip_id: Option<String>,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let broker = format!("{:?}", state.broker.state().await).to_lowercase();
    Json(json!({
        "status": "healthy",
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "broker": broker
    }))
}

/// GET /api/notifications?trip_id=...
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<Notification>> {
    Json(state.log.list(params.trip_id.as_deref()).await)
}

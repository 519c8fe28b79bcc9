//! Pricing HTTP API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use event_bus::BrokerClient;
use event_consumer::LatLng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::fare::{Fare, FareRule};

#[derive(Clone)]
pub struct AppState {
    pub rule: FareRule,
    pub broker: Arc<BrokerClient>,
    pub service_name: String,
}

impl AppState {
    pub fn new(rule: FareRule, broker: Arc<BrokerClient>, service_name: impl Into<String>) -> Self {
        Self {
            rule,
            broker,
            service_name: service_name.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/quotes", post(preview_quote))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub trip_id: Option<String>,
    pub pickup: LatLng,
    pub dropoff: LatLng,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    #[serde(flatten)]
    pub fare: Fare,
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

/// POST /api/quotes
///
/// Prices a route without publishing anything.
pub async fn preview_quote(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let Json(request) = payload?;

    for (field, point) in [("pickup", &request.pickup), ("dropoff", &request.dropoff)] {
        point
            .validate(field)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }

    Ok(Json(QuoteResponse {
        trip_id: request.trip_id,
        fare: state.rule.fare(request.pickup, request.dropoff),
    }))
}

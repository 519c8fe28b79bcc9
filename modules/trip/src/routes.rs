//! Trip HTTP API

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use event_bus::{BrokerClient, EventName};
use event_consumer::{EventContract, LatLng, TripCompleted};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::models::{Trip, TripUpdate};
use crate::store::{StoreError, TripStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TripStore>,
    pub broker: Arc<BrokerClient>,
    pub service_name: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TripStore>,
        broker: Arc<BrokerClient>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            broker,
            service_name: service_name.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/trips", get(list_trips).post(create_trip))
        .route("/api/trips/{trip_id}", get(get_trip))
        .route("/api/trips/{trip_id}/complete", post(complete_trip))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error response wrapper for proper HTTP error handling
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bus_unavailable(e: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Event bus unavailable: {}", e),
        )
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidTransition(_) => StatusCode::CONFLICT,
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::Database(err) => {
                tracing::error!(error = %err, "Trip store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub rider_id: String,
    pub pickup: LatLng,
    pub dropoff: LatLng,
}

#[derive(Debug, Serialize)]
pub struct CreateTripResponse {
    pub trip: Trip,
    /// Name of the event announcing the trip
    pub published: EventName,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTripRequest {
    pub final_price_dkk: f64,
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

/// GET /api/trips
pub async fn list_trips(State(state): State<AppState>) -> Result<Json<Vec<Trip>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

/// GET /api/trips/{trip_id}
pub async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Trip>, ApiError> {
    state
        .store
        .get(&trip_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Trip not found"))
}

/// POST /api/trips
///
/// Stores the trip as REQUESTED and publishes `trip.requested`. If the
/// publish fails the trip is kept and the caller gets 503.
pub async fn create_trip(
    State(state): State<AppState>,
    payload: Result<Json<CreateTripRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateTripResponse>), ApiError> {
    let Json(request) = payload?;

    let rider_id = request.rider_id.trim();
    if rider_id.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "rider_id must not be empty"));
    }
    for (field, point) in [("pickup", &request.pickup), ("dropoff", &request.dropoff)] {
        point
            .validate(field)
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
    }

    let trip = state
        .store
        .create(Trip::new(rider_id, request.pickup, request.dropoff))
        .await?;

    let event = trip.requested_event().to_event(&state.service_name);
    if let Err(e) = state.broker.publish(&event).await {
        tracing::error!(trip_id = %trip.id, error = %e, "Failed to publish trip.requested");
        return Err(ApiError::bus_unavailable(e));
    }

    tracing::info!(trip_id = %trip.id, rider_id = %trip.rider_id, event_id = %event.id, "Trip requested");

    Ok((
        StatusCode::CREATED,
        Json(CreateTripResponse {
            trip,
            published: event.name,
        }),
    ))
}

/// POST /api/trips/{trip_id}/complete
pub async fn complete_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    payload: Result<Json<CompleteTripRequest>, JsonRejection>,
) -> Result<Json<Trip>, ApiError> {
    let Json(request) = payload?;

    let trip = state
        .store
        .update(
            &trip_id,
            TripUpdate::Complete {
                final_price_dkk: request.final_price_dkk,
            },
        )
        .await?;

    let completed = TripCompleted {
        trip_id: trip.id.clone(),
        rider_id: trip.rider_id.clone(),
        driver_id: trip.assigned_driver_id.clone().unwrap_or_default(),
        final_price_dkk: request.final_price_dkk,
    };
    let event = completed.to_event(&state.service_name);
    if let Err(e) = state.broker.publish(&event).await {
        tracing::error!(trip_id = %trip.id, error = %e, "Failed to publish trip.completed");
        return Err(ApiError::bus_unavailable(e));
    }

    tracing::info!(trip_id = %trip.id, final_price_dkk = request.final_price_dkk, "Trip completed");
    Ok(Json(trip))
}

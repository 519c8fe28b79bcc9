//! Driver HTTP API

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use event_bus::BrokerClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::models::{Driver, DriverUpdate};
use crate::store::{DriverStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DriverStore>,
    pub broker: Arc<BrokerClient>,
    pub service_name: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DriverStore>,
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
        .route("/api/drivers", get(list_drivers).post(create_driver))
        .route("/api/drivers/{driver_id}", get(get_driver))
        .route("/api/drivers/{driver_id}/available", post(set_available))
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
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidTransition(_) => StatusCode::CONFLICT,
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::Database(err) => {
                tracing::error!(error = %err, "Driver store failure");
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
pub struct CreateDriverRequest {
    pub name: String,
    /// Drivers start off duty unless stated otherwise
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailableRequest {
    pub available: bool,
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

/// GET /api/drivers
pub async fn list_drivers(State(state): State<AppState>) -> Result<Json<Vec<Driver>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

/// GET /api/drivers/{driver_id}
pub async fn get_driver(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
) -> Result<Json<Driver>, ApiError> {
    state
        .store
        .get(&driver_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Driver not found"))
}

/// POST /api/drivers
pub async fn create_driver(
    State(state): State<AppState>,
    payload: Result<Json<CreateDriverRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Driver>), ApiError> {
    let Json(request) = payload?;

    let mut driver = Driver::new(&request.name)?;
    if request.available {
        DriverUpdate::SetAvailable(true).apply(&mut driver);
    }
    let driver = state.store.create(driver).await?;

    tracing::info!(driver_id = %driver.id, available = driver.available, "Driver registered");
    Ok((StatusCode::CREATED, Json(driver)))
}

/// POST /api/drivers/{driver_id}/available
pub async fn set_available(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
    payload: Result<Json<SetAvailableRequest>, JsonRejection>,
) -> Result<Json<Driver>, ApiError> {
    let Json(request) = payload?;

    let driver = state
        .store
        .update(&driver_id, DriverUpdate::SetAvailable(request.available))
        .await?;

    tracing::info!(driver_id = %driver.id, available = driver.available, "Driver availability changed");
    Ok(Json(driver))
}

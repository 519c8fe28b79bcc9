use chrono::{DateTime, Utc};
use event_consumer::{LatLng, TripRequested};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Requested,
    Assigned,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Requested => "REQUESTED",
            TripStatus::Assigned => "ASSIGNED",
            TripStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "REQUESTED" => Some(TripStatus::Requested),
            "ASSIGNED" => Some(TripStatus::Assigned),
            "COMPLETED" => Some(TripStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub rider_id: String,
    pub pickup: LatLng,
    pub dropoff: LatLng,
    pub status: TripStatus,
    pub assigned_driver_id: Option<String>,
    pub estimated_price_dkk: Option<f64>,
    pub final_price_dkk: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// A freshly requested trip with a generated id
    pub fn new(rider_id: impl Into<String>, pickup: LatLng, dropoff: LatLng) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            rider_id: rider_id.into(),
            pickup,
            dropoff,
            status: TripStatus::Requested,
            assigned_driver_id: None,
            estimated_price_dkk: None,
            final_price_dkk: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Payload announcing this trip to the other services
    pub fn requested_event(&self) -> TripRequested {
        TripRequested {
            trip_id: self.id.clone(),
            rider_id: self.rider_id.clone(),
            pickup: self.pickup,
            dropoff: self.dropoff,
        }
    }
}

/// A state change to an existing trip
///
/// Every store applies updates through [`TripUpdate::apply`] so the
/// transition rules are the same regardless of backend.
#[derive(Debug, Clone, PartialEq)]
pub enum TripUpdate {
    AssignDriver(String),
    SetEstimate(f64),
    Complete { final_price_dkk: f64 },
}

impl TripUpdate {
    pub fn apply(&self, trip: &mut Trip) -> Result<(), StoreError> {
        match self {
            TripUpdate::AssignDriver(driver_id) => match trip.status {
                TripStatus::Requested => {
                    trip.status = TripStatus::Assigned;
                    trip.assigned_driver_id = Some(driver_id.clone());
                }
                TripStatus::Assigned if trip.assigned_driver_id.as_deref() == Some(driver_id.as_str()) => {
                    return Ok(());
                }
                TripStatus::Assigned => {
                    return Err(StoreError::InvalidTransition(format!(
                        "trip {} is already assigned to {}",
                        trip.id,
                        trip.assigned_driver_id.as_deref().unwrap_or("another driver")
                    )));
                }
                TripStatus::Completed => {
                    return Err(StoreError::InvalidTransition(format!(
                        "trip {} is already completed",
                        trip.id
                    )));
                }
            },
            TripUpdate::SetEstimate(price) => {
                if !price.is_finite() || *price < 0.0 {
                    return Err(StoreError::Validation(format!(
                        "estimated price must be a non-negative number, got {}",
                        price
                    )));
                }
                if trip.status == TripStatus::Completed {
                    return Err(StoreError::InvalidTransition(format!(
                        "trip {} is already completed",
                        trip.id
                    )));
                }
                trip.estimated_price_dkk = Some(*price);
            }
            TripUpdate::Complete { final_price_dkk } => {
                if !final_price_dkk.is_finite() || *final_price_dkk < 0.0 {
                    return Err(StoreError::Validation(format!(
                        "final price must be a non-negative number, got {}",
                        final_price_dkk
                    )));
                }
                // Retrying a completion with the same price is a no-op
                if trip.status == TripStatus::Completed && trip.final_price_dkk == Some(*final_price_dkk) {
                    return Ok(());
                }
                if trip.status != TripStatus::Assigned {
                    return Err(StoreError::InvalidTransition(format!(
                        "trip {} cannot be completed from {}",
                        trip.id, trip.status
                    )));
                }
                trip.status = TripStatus::Completed;
                trip.final_price_dkk = Some(*final_price_dkk);
            }
        }

        trip.updated_at = Utc::now();
        Ok(())
    }
}

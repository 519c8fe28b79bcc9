//! Trip reactions to driver assignment and pricing events

use async_trait::async_trait;
use event_bus::{Event, HandlerError};
use event_consumer::{DriverAssigned, HandlerRegistry, PricingQuoted, Reactor, RegistryError};
use std::sync::Arc;

use crate::models::TripUpdate;
use crate::store::{StoreError, TripStore};

pub const DRIVER_ASSIGNED_PURPOSE: &str = "driver-assigned";
pub const PRICING_QUOTED_PURPOSE: &str = "pricing-quoted";

pub struct TripReactor {
    store: Arc<dyn TripStore>,
}

impl TripReactor {
    pub fn new(store: Arc<dyn TripStore>) -> Self {
        Self { store }
    }

    /// Apply an update on behalf of an event
    ///
    /// Unknown trips and invalid transitions are logged and swallowed; only
    /// storage failures surface as handler errors.
    async fn apply(&self, event: &Event, trip_id: &str, update: TripUpdate) -> Result<(), HandlerError> {
        match self.store.update(trip_id, update).await {
            Ok(trip) => {
                tracing::info!(
                    event_id = %event.id,
                    trip_id = %trip.id,
                    status = %trip.status,
                    "Trip updated"
                );
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                tracing::info!(event_id = %event.id, trip_id = %trip_id, "Unknown trip, ignoring event");
                Ok(())
            }
            Err(e @ (StoreError::InvalidTransition(_) | StoreError::Validation(_))) => {
                tracing::warn!(event_id = %event.id, trip_id = %trip_id, error = %e, "Ignoring event");
                Ok(())
            }
            Err(e @ StoreError::Database(_)) => Err(Box::new(e)),
        }
    }
}

#[async_trait]
impl Reactor<DriverAssigned> for TripReactor {
    async fn react(&self, event: &Event, payload: DriverAssigned) -> Result<(), HandlerError> {
        self.apply(event, &payload.trip_id, TripUpdate::AssignDriver(payload.driver_id))
            .await
    }
}

#[async_trait]
impl Reactor<PricingQuoted> for TripReactor {
    async fn react(&self, event: &Event, payload: PricingQuoted) -> Result<(), HandlerError> {
        self.apply(
            event,
            &payload.trip_id,
            TripUpdate::SetEstimate(payload.estimated_price_dkk),
        )
        .await
    }
}

/// Subscriptions of the trip service: `trip.driver-assigned` and
/// `trip.pricing-quoted`
pub fn registry(reactor: Arc<TripReactor>) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new("trip");
    registry
        .react::<DriverAssigned, _>(DRIVER_ASSIGNED_PURPOSE, reactor.clone())?
        .react::<PricingQuoted, _>(PRICING_QUOTED_PURPOSE, reactor)?;
    Ok(registry)
}

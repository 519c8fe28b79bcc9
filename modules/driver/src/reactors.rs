//! Driver assignment on `trip.requested`

use async_trait::async_trait;
use event_bus::{BrokerClient, Event, HandlerError};
use event_consumer::{DriverAssigned, EventContract, HandlerRegistry, Reactor, RegistryError, TripRequested};
use std::sync::Arc;

use crate::models::Claim;
use crate::store::DriverStore;

pub const TRIP_REQUESTED_PURPOSE: &str = "trip-requested";

pub struct DriverReactor {
    store: Arc<dyn DriverStore>,
    broker: Arc<BrokerClient>,
    source: String,
}

impl DriverReactor {
    pub fn new(
        store: Arc<dyn DriverStore>,
        broker: Arc<BrokerClient>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            store,
            broker,
            source: source.into(),
        }
    }
}

impl DriverReactor {
    async fn announce(&self, event: &Event, trip_id: &str, driver_id: &str) -> Result<(), HandlerError> {
        let assigned = DriverAssigned {
            trip_id: trip_id.to_string(),
            driver_id: driver_id.to_string(),
        };
        if let Err(e) = self.broker.publish(&assigned.to_event(&self.source)).await {
            tracing::error!(
                event_id = %event.id,
                trip_id = %trip_id,
                driver_id = %driver_id,
                error = %e,
                "Driver claimed but driver.assigned could not be published"
            );
            return Err(Box::new(e));
        }
        Ok(())
    }
}

#[async_trait]
impl Reactor<TripRequested> for DriverReactor {
    /// Claim the first available driver and announce it
    ///
    /// A publish failure after a successful claim is returned as a handler
    /// error; the driver stays claimed for the trip. A later `trip.requested`
    /// for an already claimed trip announces the recorded driver again, which
    /// the trip service applies as a no-op when it already has it.
    async fn react(&self, event: &Event, payload: TripRequested) -> Result<(), HandlerError> {
        match self.store.claim_for_trip(&payload.trip_id).await? {
            Claim::Assigned(driver) => {
                self.announce(event, &payload.trip_id, &driver.id).await?;
                tracing::info!(
                    event_id = %event.id,
                    trip_id = %payload.trip_id,
                    driver_id = %driver.id,
                    "Driver assigned"
                );
            }
            Claim::AlreadyAssigned(driver_id) => {
                self.announce(event, &payload.trip_id, &driver_id).await?;
                tracing::info!(
                    event_id = %event.id,
                    trip_id = %payload.trip_id,
                    driver_id = %driver_id,
                    "Trip already has a driver, re-announced assignment"
                );
            }
            Claim::NoneAvailable => {
                tracing::info!(
                    event_id = %event.id,
                    trip_id = %payload.trip_id,
                    "No drivers available"
                );
            }
        }
        Ok(())
    }
}

/// Subscription of the driver service: `driver.trip-requested`
pub fn registry(reactor: Arc<DriverReactor>) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new("driver");
    registry.react::<TripRequested, _>(TRIP_REQUESTED_PURPOSE, reactor)?;
    Ok(registry)
}

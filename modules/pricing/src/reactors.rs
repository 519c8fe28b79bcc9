//! Fare quotes for requested trips

use async_trait::async_trait;
use event_bus::{BrokerClient, Event, HandlerError};
use event_consumer::{EventContract, HandlerRegistry, Reactor, RegistryError, TripRequested};
use std::sync::Arc;

use crate::fare::FareRule;

pub const TRIP_REQUESTED_PURPOSE: &str = "trip-requested";

pub struct PricingReactor {
    rule: FareRule,
    broker: Arc<BrokerClient>,
    source: String,
}

impl PricingReactor {
    pub fn new(rule: FareRule, broker: Arc<BrokerClient>, source: impl Into<String>) -> Self {
        Self {
            rule,
            broker,
            source: source.into(),
        }
    }
}

#[async_trait]
impl Reactor<TripRequested> for PricingReactor {
    async fn react(&self, event: &Event, payload: TripRequested) -> Result<(), HandlerError> {
        let fare = self.rule.fare(payload.pickup, payload.dropoff);
        let quoted = fare.quoted(&payload.trip_id).to_event(&self.source);

        self.broker.publish(&quoted).await?;

        tracing::info!(
            event_id = %event.id,
            trip_id = %payload.trip_id,
            distance_km = fare.distance_km,
            estimated_price_dkk = fare.estimated_price_dkk,
            "Trip priced"
        );
        Ok(())
    }
}

/// Subscription of the pricing service: `pricing.trip-requested`
pub fn registry(reactor: Arc<PricingReactor>) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new("pricing");
    registry.react::<TripRequested, _>(TRIP_REQUESTED_PURPOSE, reactor)?;
    Ok(registry)
}

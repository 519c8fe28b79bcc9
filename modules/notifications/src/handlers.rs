//! Notification reactions to `driver.assigned` and `trip.completed`
//!
//! Delivery is mocked: the notification is logged and announced with
//! `notification.sent`, then recorded once the announcement is published.

use async_trait::async_trait;
use event_bus::{BrokerClient, Event, HandlerError};
use event_consumer::{
    DriverAssigned, EventContract, HandlerRegistry, Reactor, RegistryError, TripCompleted,
};
use std::sync::Arc;

use crate::log::NotificationLog;
use crate::models::Notification;

pub const DRIVER_ASSIGNED_PURPOSE: &str = "driver-assigned";
pub const TRIP_COMPLETED_PURPOSE: &str = "trip-completed";

pub struct NotificationReactor {
    log: Arc<NotificationLog>,
    broker: Arc<BrokerClient>,
    source: String,
}

impl NotificationReactor {
    pub fn new(
        log: Arc<NotificationLog>,
        broker: Arc<BrokerClient>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            log,
            broker,
            source: source.into(),
        }
    }

    async fn send(&self, event: &Event, notification: Notification) -> Result<(), HandlerError> {
        tracing::info!(
            notification_id = %notification.id,
            channel = notification.kind.as_str(),
            recipient_id = %notification.recipient_id,
            "Mock: Sending notification"
        );

        let sent = notification.sent_event().to_event(&self.source);
        self.broker.publish(&sent).await?;
        self.log.record(notification.clone()).await;

        tracing::info!(
            event_id = %event.id,
            notification_id = %notification.id,
            trip_id = %notification.trip_id,
            "Notification sent"
        );
        Ok(())
    }
}

#[async_trait]
impl Reactor<DriverAssigned> for NotificationReactor {
    async fn react(&self, event: &Event, payload: DriverAssigned) -> Result<(), HandlerError> {
        self.send(
            event,
            Notification::driver_assigned(&payload.trip_id, &payload.driver_id),
        )
        .await
    }
}

#[async_trait]
impl Reactor<TripCompleted> for NotificationReactor {
    async fn react(&self, event: &Event, payload: TripCompleted) -> Result<(), HandlerError> {
        self.send(
            event,
            Notification::trip_completed(
                &payload.trip_id,
                &payload.rider_id,
                payload.final_price_dkk,
            ),
        )
        .await
    }
}

/// Subscriptions of the notification service:
/// `notifications.driver-assigned` and `notifications.trip-completed`
pub fn registry(reactor: Arc<NotificationReactor>) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new("notifications");
    registry
        .react::<DriverAssigned, _>(DRIVER_ASSIGNED_PURPOSE, reactor.clone())?
        .react::<TripCompleted, _>(TRIP_COMPLETED_PURPOSE, reactor)?;
    Ok(registry)
}

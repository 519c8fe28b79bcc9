use chrono::{DateTime, Utc};
use event_consumer::{NotificationKind, NotificationSent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notification handed to a (mock) delivery channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub trip_id: String,
    pub recipient_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        trip_id: &str,
        recipient_id: &str,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            recipient_id: recipient_id.to_string(),
            kind,
            message: message.into(),
            sent_at: Utc::now(),
        }
    }

    /// Push to the driver who was assigned to a trip
    pub fn driver_assigned(trip_id: &str, driver_id: &str) -> Self {
        Self::new(
            trip_id,
            driver_id,
            NotificationKind::Push,
            format!("You have been assigned to trip {}", trip_id),
        )
    }

    /// SMS receipt to the rider of a completed trip
    pub fn trip_completed(trip_id: &str, rider_id: &str, final_price_dkk: f64) -> Self {
        Self::new(
            trip_id,
            rider_id,
            NotificationKind::Sms,
            format!(
                "Your trip {} is complete. Total: {:.2} DKK",
                trip_id, final_price_dkk
            ),
        )
    }

    pub fn sent_event(&self) -> NotificationSent {
        NotificationSent {
            trip_id: self.trip_id.clone(),
            recipient_id: self.recipient_id.clone(),
            kind: self.kind,
            message: self.message.clone(),
        }
    }
}

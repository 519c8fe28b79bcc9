//! Payload contracts for every event a service reacts to
//!
//! Each contract is the typed shape of one event's payload. Consumers decode
//! through [`EventContract::from_event`], which fails when the event name does
//! not match, a required key is missing or mistyped, or a value is out of
//! range. Producers build events with [`EventContract::to_event`].

use event_bus::{Event, EventName, Payload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a payload could not be turned into a contract
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("expected {expected} event, got {actual}")]
    NameMismatch {
        expected: EventName,
        actual: EventName,
    },

    #[error("payload missing or mistyped field: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid payload: {0}")]
    Invalid(String),
}

/// Typed payload bound to one event name
pub trait EventContract: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: EventName;

    /// Range and consistency checks beyond what the types enforce
    fn validate(&self) -> Result<(), ContractError> {
        Ok(())
    }

    fn from_event(event: &Event) -> Result<Self, ContractError> {
        if event.name != Self::NAME {
            return Err(ContractError::NameMismatch {
                expected: Self::NAME,
                actual: event.name,
            });
        }

        let contract: Self = serde_json::from_value(Value::Object(event.payload.clone()))?;
        contract.validate()?;
        Ok(contract)
    }

    fn to_payload(&self) -> Payload {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Payload::new(),
        }
    }

    fn to_event(&self, source: &str) -> Event {
        Event::new(Self::NAME, source, self.to_payload())
    }
}

fn require_id(field: &str, value: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        return Err(ContractError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_amount(field: &str, value: f64) -> Result<(), ContractError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ContractError::Invalid(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(())
}

/// A geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self, field: &str) -> Result<(), ContractError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ContractError::Invalid(format!(
                "{}.lat must be within [-90, 90], got {}",
                field, self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(ContractError::Invalid(format!(
                "{}.lng must be within [-180, 180], got {}",
                field, self.lng
            )));
        }
        Ok(())
    }
}

/// `trip.requested`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequested {
    pub trip_id: String,
    pub rider_id: String,
    pub pickup: LatLng,
    pub dropoff: LatLng,
}

impl EventContract for TripRequested {
    const NAME: EventName = EventName::TripRequested;

    fn validate(&self) -> Result<(), ContractError> {
        require_id("trip_id", &self.trip_id)?;
        require_id("rider_id", &self.rider_id)?;
        self.pickup.validate("pickup")?;
        self.dropoff.validate("dropoff")
    }
}

/// `driver.assigned`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverAssigned {
    pub trip_id: String,
    pub driver_id: String,
}

impl EventContract for DriverAssigned {
    const NAME: EventName = EventName::DriverAssigned;

    fn validate(&self) -> Result<(), ContractError> {
        require_id("trip_id", &self.trip_id)?;
        require_id("driver_id", &self.driver_id)
    }
}

/// `pricing.quoted`
///
/// Only `trip_id` and `estimated_price_dkk` are required; the breakdown is
/// informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingQuoted {
    pub trip_id: String,
    pub estimated_price_dkk: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fare: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_fare: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_fare: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl EventContract for PricingQuoted {
    const NAME: EventName = EventName::PricingQuoted;

    fn validate(&self) -> Result<(), ContractError> {
        require_id("trip_id", &self.trip_id)?;
        require_amount("estimated_price_dkk", self.estimated_price_dkk)
    }
}

/// `trip.completed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCompleted {
    pub trip_id: String,
    pub rider_id: String,
    pub driver_id: String,
    pub final_price_dkk: f64,
}

impl EventContract for TripCompleted {
    const NAME: EventName = EventName::TripCompleted;

    fn validate(&self) -> Result<(), ContractError> {
        require_id("trip_id", &self.trip_id)?;
        require_id("rider_id", &self.rider_id)?;
        require_amount("final_price_dkk", self.final_price_dkk)
    }
}

/// Delivery channel of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Sms,
    Email,
    Push,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Sms => "sms",
            NotificationKind::Email => "email",
            NotificationKind::Push => "push",
        }
    }
}

/// `notification.sent`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSent {
    pub trip_id: String,
    pub recipient_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
}

impl EventContract for NotificationSent {
    const NAME: EventName = EventName::NotificationSent;

    fn validate(&self) -> Result<(), ContractError> {
        require_id("trip_id", &self.trip_id)?;
        require_id("recipient_id", &self.recipient_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: EventName, payload: Value) -> Event {
        Event::new(name, "test", payload.as_object().cloned().unwrap())
    }

    #[test]
    fn test_trip_requested_decodes() {
        let e = event(
            EventName::TripRequested,
            json!({
                "trip_id": "t1",
                "rider_id": "r1",
                "pickup": {"lat": 55.0, "lng": 12.0},
                "dropoff": {"lat": 55.1, "lng": 12.1}
            }),
        );

        let contract = TripRequested::from_event(&e).unwrap();
        assert_eq!(contract.trip_id, "t1");
        assert_eq!(contract.pickup, LatLng::new(55.0, 12.0));
    }

    #[test]
    fn test_name_mismatch() {
        let e = event(EventName::PricingQuoted, json!({"trip_id": "t1", "driver_id": "d1"}));
        assert!(matches!(
            DriverAssigned::from_event(&e),
            Err(ContractError::NameMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let e = event(EventName::DriverAssigned, json!({"trip_id": "t1"}));
        assert!(matches!(
            DriverAssigned::from_event(&e),
            Err(ContractError::Malformed(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_are_invalid() {
        let e = event(
            EventName::TripRequested,
            json!({
                "trip_id": "t1",
                "rider_id": "r1",
                "pickup": {"lat": 91.0, "lng": 12.0},
                "dropoff": {"lat": 55.1, "lng": 12.1}
            }),
        );
        assert!(matches!(TripRequested::from_event(&e), Err(ContractError::Invalid(_))));

        let e = event(
            EventName::PricingQuoted,
            json!({"trip_id": "t1", "estimated_price_dkk": -1.0}),
        );
        assert!(matches!(PricingQuoted::from_event(&e), Err(ContractError::Invalid(_))));

        let e = event(EventName::DriverAssigned, json!({"trip_id": " ", "driver_id": "d1"}));
        assert!(matches!(DriverAssigned::from_event(&e), Err(ContractError::Invalid(_))));
    }

    #[test]
    fn test_minimal_quote_and_extra_keys_accepted() {
        let e = event(
            EventName::PricingQuoted,
            json!({"trip_id": "missing", "estimated_price_dkk": 99.0, "surge": 1.2}),
        );

        let quote = PricingQuoted::from_event(&e).unwrap();
        assert_eq!(quote.estimated_price_dkk, 99.0);
        assert_eq!(quote.currency, None);
    }

    #[test]
    fn test_to_event_uses_contract_name() {
        let sent = NotificationSent {
            trip_id: "t1".to_string(),
            recipient_id: "d1".to_string(),
            kind: NotificationKind::Push,
            message: "New trip".to_string(),
        };

        let e = sent.to_event("notification-service");
        assert_eq!(e.name, EventName::NotificationSent);
        assert_eq!(e.source, "notification-service");
        assert_eq!(e.payload_str("type"), Some("push"));
        assert_eq!(NotificationSent::from_event(&e).unwrap(), sent);
    }

    #[test]
    fn test_optional_breakdown_omitted_from_payload() {
        let quote = PricingQuoted {
            trip_id: "t1".to_string(),
            estimated_price_dkk: 45.0,
            base_fare: None,
            distance_fare: None,
            time_fare: None,
            distance_km: None,
            currency: None,
        };

        let payload = quote.to_payload();
        assert_eq!(payload.len(), 2);
    }
}

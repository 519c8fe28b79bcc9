//! # Event Envelope
//!
//! The single message shape exchanged between services.
//!
//! ## Envelope Fields
//!
//! - `name`: one of the known [`EventName`]s, also used as the routing key
//! - `id`: unique token per emission (used for duplicate detection)
//! - `ts`: ISO 8601 UTC timestamp with a trailing `Z`
//! - `source`: service that emitted the event (e.g. "trip-service")
//! - `payload`: event-specific JSON object
//!
//! The wire body is the canonical JSON encoding of exactly these five fields.
//! Decoding rejects bodies with missing, unknown, or mistyped fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Event-specific data carried by an [`Event`]
pub type Payload = Map<String, Value>;

/// Every event type known to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "trip.requested")]
    TripRequested,
    #[serde(rename = "driver.assigned")]
    DriverAssigned,
    #[serde(rename = "pricing.quoted")]
    PricingQuoted,
    #[serde(rename = "trip.completed")]
    TripCompleted,
    #[serde(rename = "payment.charged")]
    PaymentCharged,
    #[serde(rename = "notification.sent")]
    NotificationSent,
}

impl EventName {
    pub const ALL: [EventName; 6] = [
        EventName::TripRequested,
        EventName::DriverAssigned,
        EventName::PricingQuoted,
        EventName::TripCompleted,
        EventName::PaymentCharged,
        EventName::NotificationSent,
    ];

    /// Dot-separated wire name, also the routing key
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::TripRequested => "trip.requested",
            EventName::DriverAssigned => "driver.assigned",
            EventName::PricingQuoted => "pricing.quoted",
            EventName::TripCompleted => "trip.completed",
            EventName::PaymentCharged => "payment.charged",
            EventName::NotificationSent => "notification.sent",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownEventName(s.to_string()))
    }
}

/// Errors raised while turning a message body back into an [`Event`]
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed event body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event name: {0}")]
    UnknownEventName(String),
}

/// Immutable event envelope
///
/// # Examples
///
/// ```rust
/// use event_bus::{Event, EventName};
/// use serde_json::json;
///
/// let payload = json!({"trip_id": "t1", "driver_id": "d1"});
/// let event = Event::new(
///     EventName::DriverAssigned,
///     "driver-service",
///     payload.as_object().cloned().unwrap_or_default(),
/// );
///
/// let bytes = event.encode();
/// let decoded = Event::decode(&bytes).unwrap();
/// assert_eq!(decoded, event);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Event {
    pub name: EventName,
    pub id: String,
    pub ts: String,
    pub source: String,
    pub payload: Payload,
}

impl Event {
    /// Create a new event with a fresh id and the current timestamp
    pub fn new(name: EventName, source: impl Into<String>, payload: Payload) -> Self {
        Self {
            name,
            id: Uuid::new_v4().to_string(),
            ts: now_iso(),
            source: source.into(),
            payload,
        }
    }

    /// Create an event with every field given explicitly (useful for testing
    /// and for replaying stored events)
    pub fn from_parts(
        name: EventName,
        id: impl Into<String>,
        ts: impl Into<String>,
        source: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            name,
            id: id.into(),
            ts: ts.into(),
            source: source.into(),
            payload,
        }
    }

    /// Serialize to the canonical JSON wire body
    pub fn encode(&self) -> Vec<u8> {
        // Plain strings and a JSON map cannot fail to serialize
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse a wire body, failing if any envelope field is absent
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Look up a string payload field
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Last timestamp handed out by [`now_iso`], in microseconds since the epoch
static LAST_TS_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.ffffffZ`
///
/// Never returns a value earlier than a previous call in the same process,
/// even if the wall clock steps backwards.
pub fn now_iso() -> String {
    let now = Utc::now().timestamp_micros();
    let previous = LAST_TS_MICROS.fetch_max(now, Ordering::SeqCst);
    let micros = previous.max(now);

    DateTime::<Utc>::from_timestamp_micros(micros)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

//! # EventBus Abstraction
//!
//! The publish/subscribe layer that lets services react to each other's
//! state changes without calling each other directly.
//!
//! ## Layers
//!
//! - [`EventBus`]: transport trait over a durable, topic-routed exchange
//!   (connect, publish by routing key, consume from a named durable queue,
//!   acknowledge or reject each delivery)
//! - [`BrokerClient`]: the process-wide client services use. Adds the
//!   connection state machine, bounded connect retry, event encoding, and one
//!   consumption task per subscription
//! - [`Event`]: the envelope every message carries
//!
//! ## Implementations
//!
//! - **NatsBus**: Production implementation using NATS JetStream
//! - **InMemoryBus**: Test/dev implementation using in-memory queues
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_bus::{handler_fn, BrokerClient, Event, EventName, InMemoryBus, RetryConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = BrokerClient::new(Arc::new(InMemoryBus::new()), RetryConfig::default());
//! broker.connect().await?;
//!
//! broker
//!     .subscribe(
//!         EventName::TripRequested,
//!         "driver.trip-requested",
//!         handler_fn(|event: Event| async move {
//!             println!("trip requested: {:?}", event.payload);
//!             Ok(())
//!         }),
//!     )
//!     .await?;
//!
//! broker
//!     .publish(&Event::new(EventName::TripRequested, "trip-service", Default::default()))
//!     .await?;
//!
//! broker.close().await?;
//! # Ok(())
//! # }
//! ```

mod broker;
mod config;
mod envelope;
mod inmemory_bus;
mod nats_bus;
pub mod retry;

pub use broker::{handler_fn, BrokerClient, BrokerState, EventHandler, FnHandler, HandlerError};
pub use config::{BusConfig, BusKind};
pub use envelope::{now_iso, DecodeError, Event, EventName, Payload};
pub use inmemory_bus::InMemoryBus;
pub use nats_bus::{NatsBus, ACK_WAIT, DEFAULT_EXCHANGE};
pub use retry::RetryConfig;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// A message received from the event bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// The routing key this message was published with
    pub routing_key: String,
    /// The message payload (raw bytes)
    pub payload: Vec<u8>,
    /// Transport headers, if the transport carries any
    pub headers: Option<std::collections::HashMap<String, String>>,
}

impl BusMessage {
    /// Create a new bus message
    pub fn new(routing_key: String, payload: Vec<u8>) -> Self {
        Self {
            routing_key,
            payload,
            headers: None,
        }
    }

    /// Add headers to the message
    pub fn with_headers(mut self, headers: std::collections::HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// Settles a single delivery with the transport
///
/// [`Delivery`] consumes itself when settling, so each acknowledger is used
/// at most once.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Confirm the delivery was processed; the broker may discard it
    async fn ack(&self) -> BusResult<()>;

    /// Drop the delivery without requeueing it
    async fn reject(&self) -> BusResult<()>;
}

/// A message handed out by a queue, to be settled exactly once
pub struct Delivery {
    pub message: BusMessage,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(message: BusMessage, acker: Box<dyn Acknowledger>) -> Self {
        Self { message, acker }
    }

    /// Acknowledge after successful processing
    pub async fn ack(self) -> BusResult<()> {
        self.acker.ack().await
    }

    /// Reject without requeue (poison messages must not loop forever)
    pub async fn reject(self) -> BusResult<()> {
        self.acker.reject().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Errors that can occur when using the event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("event bus not connected")]
    NotConnected,

    #[error("event bus closed")]
    Closed,

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("failed to publish message: {0}")]
    PublishError(String),

    #[error("failed to subscribe to queue: {0}")]
    SubscribeError(String),

    #[error("failed to settle delivery: {0}")]
    AckError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("invalid routing key or queue name: {0}")]
    InvalidSubject(String),
}

/// Result type for event bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Transport abstraction over a durable, topic-routed exchange
///
/// Implementations must keep queues durable: a queue declared under a name
/// keeps receiving messages for its bindings while no consumer is attached,
/// and a later `subscribe` with the same name resumes from it.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Establish the connection and declare the durable topic exchange
    async fn connect(&self) -> BusResult<()>;

    /// Publish a message with persistent delivery
    ///
    /// # Arguments
    /// * `routing_key` - The routing key (e.g., "trip.requested")
    /// * `payload` - The message payload as raw bytes
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> BusResult<()>;

    /// Declare a durable queue, bind it to the exchange, and consume from it
    ///
    /// # Arguments
    /// * `binding` - The routing key pattern the queue is bound with
    /// * `queue` - Durable queue name (the consumer group identifier)
    ///
    /// # Returns
    /// * `Ok(BoxStream)` of deliveries, each to be acked or rejected
    /// * `Err(BusError)` if the queue could not be declared or bound
    async fn subscribe(&self, binding: &str, queue: &str)
        -> BusResult<BoxStream<'static, Delivery>>;

    /// Release the connection
    async fn close(&self) -> BusResult<()>;
}

impl fmt::Debug for dyn EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}

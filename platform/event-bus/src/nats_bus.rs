//! NATS JetStream implementation of the EventBus trait

use crate::{Acknowledger, BusError, BusMessage, BusResult, Delivery, EventBus};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy},
    stream::{self, RetentionPolicy, StorageType},
    AckKind,
};
use async_nats::Client;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;
use tokio::sync::RwLock;

/// Default stream name, also the subject prefix every routing key lives under
pub const DEFAULT_EXCHANGE: &str = "events";

/// How long an unacked delivery holds the consumer's single pending slot
pub const ACK_WAIT: Duration = Duration::from_secs(300);

/// EventBus implementation using NATS JetStream
///
/// This is the production implementation that connects to a NATS server.
/// The exchange is a file-backed stream with interest retention capturing
/// `{exchange}.>`; every queue is a durable pull consumer with explicit acks.
/// A message nobody's filter matches when it is published is discarded by
/// the stream, and a consumer keeps its position while no process is
/// attached to it.
///
/// # Example
/// ```rust,no_run
/// use event_bus::{EventBus, NatsBus};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = NatsBus::new("nats://localhost:4222");
/// bus.connect().await?;
///
/// bus.publish("trip.requested", b"hello".to_vec()).await?;
/// # Ok(())
/// # }
/// ```
pub struct NatsBus {
    url: String,
    exchange: String,
    connection: RwLock<Option<Connection>>,
}

struct Connection {
    client: Client,
    jetstream: jetstream::Context,
}

struct JetStreamAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acknowledger for JetStreamAcker {
    async fn ack(&self) -> BusResult<()> {
        self.message
            .ack()
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }

    async fn reject(&self) -> BusResult<()> {
        // Term tells the server never to redeliver this message
        self.message
            .ack_with(AckKind::Term)
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }
}

impl NatsBus {
    /// Create a bus for the given server URL; nothing is dialed until `connect`
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_exchange(url, DEFAULT_EXCHANGE)
    }

    /// Create a bus that uses a stream other than [`DEFAULT_EXCHANGE`]
    pub fn with_exchange(url: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            exchange: exchange.into(),
            connection: RwLock::new(None),
        }
    }

    /// Get the underlying NATS client, if connected
    pub async fn client(&self) -> Option<Client> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|c| c.client.clone())
    }

    async fn jetstream(&self) -> BusResult<jetstream::Context> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|c| c.jetstream.clone())
            .ok_or(BusError::NotConnected)
    }

    /// Translate a topic binding into a JetStream filter subject
    ///
    /// `*` carries over unchanged; a trailing `#` becomes `>`. A bare `#`
    /// matches everything under the exchange. `#` elsewhere has no NATS
    /// equivalent and is refused.
    fn filter_subject(&self, binding: &str) -> BusResult<String> {
        if binding.is_empty() {
            return Err(BusError::InvalidSubject(binding.to_string()));
        }

        let mut tokens: Vec<&str> = binding.split('.').collect();
        let trailing_hash = tokens.last() == Some(&"#");
        if trailing_hash {
            tokens.pop();
        }
        if tokens.iter().any(|t| t.is_empty() || *t == "#" || *t == ">") {
            return Err(BusError::InvalidSubject(binding.to_string()));
        }

        let mut subject = self.exchange.clone();
        for token in tokens {
            subject.push('.');
            subject.push_str(token);
        }
        if trailing_hash {
            subject.push_str(".>");
        }
        Ok(subject)
    }

    /// Durable consumer names may not contain `.`
    fn durable_name(queue: &str) -> String {
        queue.replace('.', "_")
    }

    /// Pull consumer backing one durable queue
    ///
    /// Each message is delivered at most once: a handler that outlives
    /// [`ACK_WAIT`] frees the slot for the next message instead of having
    /// its own message redelivered.
    fn consumer_config(durable: &str, filter_subject: String) -> pull::Config {
        pull::Config {
            durable_name: Some(durable.to_string()),
            filter_subject,
            ack_policy: AckPolicy::Explicit,
            ack_wait: ACK_WAIT,
            max_deliver: 1,
            max_ack_pending: 1,
            ..Default::default()
        }
    }

    fn to_bus_message(exchange: &str, message: &jetstream::Message) -> BusMessage {
        let subject = message.subject.as_str();
        let routing_key = subject
            .strip_prefix(exchange)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(subject);

        let mut msg = BusMessage::new(routing_key.to_string(), message.payload.to_vec());

        if let Some(nats_headers) = &message.headers {
            let mut headers = std::collections::HashMap::new();
            for (key, values) in nats_headers.iter() {
                // Take the first value for each header
                if let Some(value) = values.first() {
                    headers.insert(key.to_string(), value.to_string());
                }
            }
            if !headers.is_empty() {
                msg = msg.with_headers(headers);
            }
        }

        msg
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn connect(&self) -> BusResult<()> {
        if self.connection.read().await.is_some() {
            return Ok(());
        }

        let client = async_nats::connect(self.url.as_str())
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;
        let jetstream = jetstream::new(client.clone());

        jetstream
            .get_or_create_stream(stream::Config {
                name: self.exchange.clone(),
                subjects: vec![format!("{}.>", self.exchange)],
                storage: StorageType::File,
                retention: RetentionPolicy::Interest,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;

        tracing::info!(url = %self.url, exchange = %self.exchange, "Connected to NATS JetStream");
        *self.connection.write().await = Some(Connection { client, jetstream });
        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> BusResult<()> {
        let jetstream = self.jetstream().await?;
        let subject = format!("{}.{}", self.exchange, routing_key);

        // Wait for the stream to persist the message
        jetstream
            .publish(subject, payload.into())
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?;

        Ok(())
    }

    async fn subscribe(
        &self,
        binding: &str,
        queue: &str,
    ) -> BusResult<BoxStream<'static, Delivery>> {
        let jetstream = self.jetstream().await?;
        let filter_subject = self.filter_subject(binding)?;
        if queue.is_empty() {
            return Err(BusError::InvalidSubject(queue.to_string()));
        }
        let durable = Self::durable_name(queue);

        let stream = jetstream
            .get_stream(&self.exchange)
            .await
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(&durable, Self::consumer_config(&durable, filter_subject))
            .await
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let exchange = self.exchange.clone();
        let queue_name = queue.to_string();

        let deliveries = messages.filter_map(move |result| {
            let delivery = match result {
                Ok(message) => {
                    let bus_message = NatsBus::to_bus_message(&exchange, &message);
                    Some(Delivery::new(bus_message, Box::new(JetStreamAcker { message })))
                }
                Err(e) => {
                    tracing::warn!(queue = %queue_name, error = %e, "Failed to pull message from JetStream");
                    None
                }
            };
            async move { delivery }
        });

        Ok(deliveries.boxed())
    }

    async fn close(&self) -> BusResult<()> {
        let connection = self.connection.write().await.take();

        if let Some(connection) = connection {
            connection
                .client
                .flush()
                .await
                .map_err(|e| BusError::ConnectionError(e.to_string()))?;
        }

        Ok(())
    }
}

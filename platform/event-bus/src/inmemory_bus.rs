//! In-memory implementation of the EventBus trait for testing and development

use crate::{Acknowledger, BusError, BusMessage, BusResult, Delivery, EventBus};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};

/// EventBus implementation using in-memory queues
///
/// This implementation is suitable for:
/// - Unit tests (no external dependencies)
/// - Local development without Docker
/// - Integration tests that need fast, isolated message buses
///
/// It behaves like a durable topic exchange: every named queue keeps its
/// messages until a consumer takes them, consumers on the same queue compete
/// for messages, and messages published with a routing key no queue is bound
/// to are discarded.
///
/// Clones share the exchange *and* the connection. Use
/// [`InMemoryBus::new_connection`] to open an independent connection to the
/// same exchange (e.g. one per simulated service).
///
/// # Example
/// ```rust
/// use event_bus::{EventBus, InMemoryBus};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryBus::new();
/// bus.connect().await?;
///
/// // Declare and bind the queue before publishing
/// let mut deliveries = bus.subscribe("trip.*", "driver.trip-events").await?;
///
/// bus.publish("trip.requested", b"hello".to_vec()).await?;
///
/// let delivery = deliveries.next().await.unwrap();
/// assert_eq!(delivery.message.routing_key, "trip.requested");
/// delivery.ack().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBus {
    exchange: Arc<Exchange>,
    connected: Arc<AtomicBool>,
}

struct Exchange {
    reachable: AtomicBool,
    connect_attempts: AtomicU32,
    acked: AtomicU64,
    rejected: AtomicU64,
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

struct Queue {
    bindings: RwLock<HashSet<String>>,
    sender: mpsc::UnboundedSender<BusMessage>,
    receiver: Mutex<mpsc::UnboundedReceiver<BusMessage>>,
    pending: AtomicUsize,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            bindings: RwLock::new(HashSet::new()),
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
        }
    }

    async fn is_bound(&self, routing_key: &str) -> bool {
        self.bindings
            .read()
            .await
            .iter()
            .any(|pattern| InMemoryBus::matches_pattern(routing_key, pattern))
    }

    fn enqueue(&self, message: BusMessage) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        // The queue owns its receiver, so the channel is never closed
        if self.sender.send(message).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct InMemoryAcker {
    exchange: Arc<Exchange>,
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(&self) -> BusResult<()> {
        self.exchange.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reject(&self) -> BusResult<()> {
        self.exchange.rejected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl InMemoryBus {
    /// Create a new in-memory exchange with one (not yet connected) connection
    pub fn new() -> Self {
        Self {
            exchange: Arc::new(Exchange {
                reachable: AtomicBool::new(true),
                connect_attempts: AtomicU32::new(0),
                acked: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                queues: RwLock::new(HashMap::new()),
            }),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// An exchange whose `connect` always fails, for exercising startup retry
    pub fn unreachable() -> Self {
        let bus = Self::new();
        bus.set_reachable(false);
        bus
    }

    /// Open another connection to the same exchange
    pub fn new_connection(&self) -> Self {
        Self {
            exchange: self.exchange.clone(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Toggle whether future `connect` calls succeed
    pub fn set_reachable(&self, reachable: bool) {
        self.exchange.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of `connect` calls made against this exchange
    pub fn connect_attempts(&self) -> u32 {
        self.exchange.connect_attempts.load(Ordering::SeqCst)
    }

    /// Deliveries acknowledged across all queues
    pub fn acked_count(&self) -> u64 {
        self.exchange.acked.load(Ordering::SeqCst)
    }

    /// Deliveries rejected (dropped without requeue) across all queues
    pub fn rejected_count(&self) -> u64 {
        self.exchange.rejected.load(Ordering::SeqCst)
    }

    /// Messages waiting in a queue, or `None` if it was never declared
    pub async fn queue_depth(&self, queue: &str) -> Option<usize> {
        self.exchange
            .queues
            .read()
            .await
            .get(queue)
            .map(|q| q.pending.load(Ordering::SeqCst))
    }

    /// Check if a routing key matches a binding pattern
    ///
    /// Supports topic-exchange wildcards:
    /// - `*` matches exactly one word
    /// - `#` matches zero or more words
    ///
    /// # Examples
    /// - `trip.#` matches `trip.requested` and `trip`
    /// - `*.assigned` matches `driver.assigned`
    /// - `trip.*` does NOT match `trip.requested.v2` (too many words)
    fn matches_pattern(routing_key: &str, pattern: &str) -> bool {
        let key_tokens: Vec<&str> = routing_key.split('.').collect();
        let pattern_tokens: Vec<&str> = pattern.split('.').collect();
        Self::matches_tokens(&key_tokens, &pattern_tokens)
    }

    fn matches_tokens(key: &[&str], pattern: &[&str]) -> bool {
        match pattern.split_first() {
            None => key.is_empty(),
            Some((&"#", rest)) => (0..=key.len()).any(|skip| Self::matches_tokens(&key[skip..], rest)),
            Some((&"*", rest)) => !key.is_empty() && Self::matches_tokens(&key[1..], rest),
            Some((token, rest)) => {
                key.first() == Some(token) && Self::matches_tokens(&key[1..], rest)
            }
        }
    }

    fn ensure_connected(&self) -> BusResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BusError::NotConnected)
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn connect(&self) -> BusResult<()> {
        self.exchange.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.exchange.reachable.load(Ordering::SeqCst) {
            return Err(BusError::ConnectionError(
                "in-memory exchange unreachable".to_string(),
            ));
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> BusResult<()> {
        self.ensure_connected()?;

        let msg = BusMessage::new(routing_key.to_string(), payload);
        let queues = self.exchange.queues.read().await;

        for queue in queues.values() {
            if queue.is_bound(routing_key).await {
                queue.enqueue(msg.clone());
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        binding: &str,
        queue_name: &str,
    ) -> BusResult<BoxStream<'static, Delivery>> {
        self.ensure_connected()?;

        if binding.is_empty() || queue_name.is_empty() {
            return Err(BusError::InvalidSubject(format!(
                "binding '{}' / queue '{}'",
                binding, queue_name
            )));
        }

        let queue = self
            .exchange
            .queues
            .write()
            .await
            .entry(queue_name.to_string())
            .or_insert_with(|| Arc::new(Queue::new()))
            .clone();
        queue.bindings.write().await.insert(binding.to_string());

        let exchange = self.exchange.clone();

        // Consumers of the same queue share one receiver and compete for messages
        let stream = async_stream::stream! {
            loop {
                let next = {
                    let mut receiver = queue.receiver.lock().await;
                    receiver.recv().await
                };

                match next {
                    Some(message) => {
                        queue.pending.fetch_sub(1, Ordering::SeqCst);
                        let acker = InMemoryAcker { exchange: exchange.clone() };
                        yield Delivery::new(message, Box::new(acker));
                    }
                    None => break,
                }
            }
        };

        Ok(stream.boxed())
    }

    async fn close(&self) -> BusResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

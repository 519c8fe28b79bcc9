//! Broker client: the process-wide handle services publish and consume through

use crate::retry::{retry_with_backoff, RetryConfig};
use crate::{BusError, BusResult, Delivery, Event, EventBus, EventName};
use async_trait::async_trait;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Error returned by an event handler; the delivery is rejected
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Reacts to one decoded event
///
/// Returning `Ok` acknowledges the delivery. Returning `Err` rejects it
/// without requeue, so handlers must treat invalid input as handled.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into an [`EventHandler`]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        (self.f)(event).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Connection lifecycle of a [`BrokerClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Disconnected,
    Connected,
    Closed,
}

/// Process-wide broker client
///
/// Wraps a transport with the connection state machine
/// (`Disconnected -> Connected -> Closed`), bounded connect retry, event
/// encoding, and one consumption task per subscription. Each subscription
/// processes its deliveries one at a time, acking on handler success and
/// rejecting on decode or handler failure.
pub struct BrokerClient {
    transport: Arc<dyn EventBus>,
    retry: RetryConfig,
    state: RwLock<BrokerState>,
    shutdown: watch::Sender<bool>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl BrokerClient {
    pub fn new(transport: Arc<dyn EventBus>, retry: RetryConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            transport,
            retry,
            state: RwLock::new(BrokerState::Disconnected),
            shutdown,
            consumers: Mutex::new(Vec::new()),
        }
    }

    pub async fn state(&self) -> BrokerState {
        *self.state.read().await
    }

    /// Connect the transport, retrying per the configured backoff
    ///
    /// A no-op when already connected. Fails with the last transport error
    /// once every attempt is exhausted.
    pub async fn connect(&self) -> BusResult<()> {
        let mut state = self.state.write().await;
        match *state {
            BrokerState::Connected => return Ok(()),
            BrokerState::Closed => return Err(BusError::Closed),
            BrokerState::Disconnected => {}
        }

        let transport = self.transport.clone();
        retry_with_backoff(
            || {
                let transport = transport.clone();
                async move { transport.connect().await }
            },
            &self.retry,
            "broker_connect",
        )
        .await?;

        *state = BrokerState::Connected;
        tracing::info!("Broker client connected");
        Ok(())
    }

    async fn ensure_connected(&self) -> BusResult<()> {
        match *self.state.read().await {
            BrokerState::Connected => Ok(()),
            BrokerState::Disconnected => Err(BusError::NotConnected),
            BrokerState::Closed => Err(BusError::Closed),
        }
    }

    /// Publish an event using its name as the routing key
    pub async fn publish(&self, event: &Event) -> BusResult<()> {
        self.ensure_connected().await?;

        self.transport
            .publish(event.name.as_str(), event.encode())
            .await?;

        tracing::debug!(
            event_id = %event.id,
            event_name = %event.name,
            source = %event.source,
            "Published event"
        );
        Ok(())
    }

    /// Consume `event_name` from the durable queue `group`
    ///
    /// Spawns the consumption task and returns once the queue is bound.
    /// Multiple processes subscribing with the same group share the queue and
    /// each message is handled by only one of them.
    pub async fn subscribe(
        &self,
        event_name: EventName,
        group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> BusResult<()> {
        self.ensure_connected().await?;

        // Taken before binding so a close racing the bind is still observed
        let mut shutdown = self.shutdown.subscribe();
        let mut deliveries = self.transport.subscribe(event_name.as_str(), group).await?;
        let queue = group.to_string();

        // close() marks the state before draining consumers; checking under
        // the consumers lock means a live task is always drained
        let mut consumers = self.consumers.lock().await;
        if *self.state.read().await == BrokerState::Closed {
            tracing::info!(queue = %queue, "Client closed while subscribing, dropping consumer");
            return Err(BusError::Closed);
        }

        tracing::info!(queue = %queue, event_name = %event_name, "Subscribed to queue");

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        tracing::info!(queue = %queue, "Consumer stopping");
                        break;
                    }
                    next = deliveries.next() => {
                        match next {
                            Some(delivery) => process_delivery(&queue, handler.as_ref(), delivery).await,
                            None => {
                                tracing::warn!(queue = %queue, "Delivery stream ended");
                                break;
                            }
                        }
                    }
                }
            }
        });

        consumers.push(handle);
        Ok(())
    }

    /// Stop consuming, wait for in-flight handlers, and release the transport
    ///
    /// Idempotent. After closing, publish and subscribe fail with
    /// [`BusError::Closed`].
    pub async fn close(&self) -> BusResult<()> {
        {
            let mut state = self.state.write().await;
            if *state == BrokerState::Closed {
                return Ok(());
            }
            *state = BrokerState::Closed;
        }

        self.shutdown.send_replace(true);

        let handles: Vec<_> = self.consumers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Consumer task failed");
            }
        }

        self.transport.close().await?;
        tracing::info!("Broker client closed");
        Ok(())
    }
}

async fn process_delivery(queue: &str, handler: &dyn EventHandler, delivery: Delivery) {
    let event = match Event::decode(&delivery.message.payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(
                queue = %queue,
                routing_key = %delivery.message.routing_key,
                error = %e,
                "Failed to decode event, rejecting"
            );
            if let Err(e) = delivery.reject().await {
                tracing::error!(queue = %queue, error = %e, "Failed to reject delivery");
            }
            return;
        }
    };

    let span = tracing::info_span!(
        "handle_event",
        event_id = %event.id,
        event_name = %event.name,
        queue = %queue,
        source = %event.source,
    );

    async move {
        let event_id = event.id.clone();

        match handler.handle(event).await {
            Ok(()) => {
                if let Err(e) = delivery.ack().await {
                    tracing::error!(error = %e, "Failed to ack delivery");
                }
            }
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Handler failed, rejecting");
                if let Err(e) = delivery.reject().await {
                    tracing::error!(error = %e, "Failed to reject delivery");
                }
            }
        }
    }
    .instrument(span)
    .await
}

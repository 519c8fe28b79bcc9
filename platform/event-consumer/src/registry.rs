use crate::contracts::EventContract;
use crate::idempotency::{Deduplicating, DEFAULT_WINDOW};
use crate::reactor::{ContractHandler, Reactor};
use event_bus::{BrokerClient, BusError, EventHandler, EventName};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a handler for {0} is already registered")]
    DuplicateHandler(EventName),

    #[error("invalid queue purpose '{0}'")]
    InvalidPurpose(String),

    #[error("failed to subscribe {queue}: {source}")]
    Subscribe {
        queue: String,
        #[source]
        source: BusError,
    },
}

struct Registration {
    event_name: EventName,
    queue: String,
    handler: Arc<dyn EventHandler>,
}

/// Per-service table of event name → handler
///
/// Each registration gets its own durable queue named
/// `"{service}.{purpose}"`, e.g. `trip.driver-assigned`. Handlers are wrapped
/// in a processed-event guard when registered.
pub struct HandlerRegistry {
    service: String,
    dedupe_window: usize,
    registrations: Vec<Registration>,
}

impl HandlerRegistry {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            dedupe_window: DEFAULT_WINDOW,
            registrations: Vec::new(),
        }
    }

    /// Number of event ids remembered per queue for duplicate suppression
    pub fn with_dedupe_window(mut self, window: usize) -> Self {
        self.dedupe_window = window;
        self
    }

    pub fn register(
        &mut self,
        event_name: EventName,
        purpose: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<&mut Self, RegistryError> {
        if purpose.is_empty() || purpose.contains(['.', ' ', '*', '#', '>']) {
            return Err(RegistryError::InvalidPurpose(purpose.to_string()));
        }
        if self.registrations.iter().any(|r| r.event_name == event_name) {
            return Err(RegistryError::DuplicateHandler(event_name));
        }

        let queue = format!("{}.{}", self.service, purpose);
        let guarded = Arc::new(Deduplicating::new(handler, queue.clone(), self.dedupe_window));

        self.registrations.push(Registration {
            event_name,
            queue,
            handler: guarded,
        });
        Ok(self)
    }

    /// Register a typed reactor for contract `C`
    pub fn react<C, R>(&mut self, purpose: &str, reactor: Arc<R>) -> Result<&mut Self, RegistryError>
    where
        C: EventContract,
        R: Reactor<C> + 'static,
    {
        let handler: Arc<dyn EventHandler> = Arc::new(ContractHandler::<C, R>::new(reactor));
        self.register(C::NAME, purpose, handler)
    }

    /// Registered `(event name, queue)` pairs in registration order
    pub fn queues(&self) -> Vec<(EventName, String)> {
        self.registrations
            .iter()
            .map(|r| (r.event_name, r.queue.clone()))
            .collect()
    }

    /// Subscribe every registration on the broker
    pub async fn start(&self, broker: &BrokerClient) -> Result<(), RegistryError> {
        for registration in &self.registrations {
            broker
                .subscribe(
                    registration.event_name,
                    &registration.queue,
                    registration.handler.clone(),
                )
                .await
                .map_err(|source| RegistryError::Subscribe {
                    queue: registration.queue.clone(),
                    source,
                })?;
        }

        tracing::info!(
            service = %self.service,
            subscriptions = self.registrations.len(),
            "Event handlers started"
        );
        Ok(())
    }
}

//! Typed dispatch from a raw [`Event`] to a service reactor

use crate::contracts::{ContractError, EventContract};
use async_trait::async_trait;
use event_bus::{Event, EventHandler, HandlerError};
use std::marker::PhantomData;
use std::sync::Arc;

/// Service-side reaction to one event contract
///
/// A reactor only sees payloads that already passed contract validation.
/// It must be idempotent: the same event can arrive more than once.
#[async_trait]
pub trait Reactor<C: EventContract>: Send + Sync {
    async fn react(&self, event: &Event, payload: C) -> Result<(), HandlerError>;
}

/// Adapts a [`Reactor`] into an [`EventHandler`]
///
/// Events with another name, missing keys, or invalid values are skipped and
/// acknowledged; they would fail the same way on every redelivery.
pub struct ContractHandler<C, R> {
    reactor: Arc<R>,
    _contract: PhantomData<fn() -> C>,
}

impl<C, R> ContractHandler<C, R>
where
    C: EventContract,
    R: Reactor<C> + 'static,
{
    pub fn new(reactor: Arc<R>) -> Self {
        Self {
            reactor,
            _contract: PhantomData,
        }
    }
}

#[async_trait]
impl<C, R> EventHandler for ContractHandler<C, R>
where
    C: EventContract,
    R: Reactor<C> + 'static,
{
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let payload = match C::from_event(&event) {
            Ok(payload) => payload,
            Err(ContractError::NameMismatch { expected, actual }) => {
                tracing::debug!(
                    event_id = %event.id,
                    expected = %expected,
                    actual = %actual,
                    "Ignoring event with unexpected name"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    event_name = %event.name,
                    error = %e,
                    "Skipping event with unusable payload"
                );
                return Ok(());
            }
        };

        self.reactor.react(&event, payload).await
    }
}

//! # Event Consumer
//!
//! Consumer-side building blocks shared by every service:
//!
//! - [`contracts`]: typed payloads for each event name, validated on decode
//! - [`Reactor`]: a service's reaction to one contract, adapted into an
//!   [`event_bus::EventHandler`] by [`ContractHandler`]
//! - [`HandlerRegistry`]: per-service table of event name → handler, with
//!   `"{service}.{purpose}"` queue naming
//! - [`idempotency`]: suppresses redelivered events that already succeeded

pub mod contracts;
pub mod idempotency;
mod reactor;
mod registry;

pub use contracts::{
    ContractError, DriverAssigned, EventContract, LatLng, NotificationKind, NotificationSent,
    PricingQuoted, TripCompleted, TripRequested,
};
pub use reactor::{ContractHandler, Reactor};
pub use registry::{HandlerRegistry, RegistryError};

//! Driver service
//!
//! Keeps the driver roster. On every `trip.requested` it claims the first
//! available driver for the trip and publishes `driver.assigned`.

pub mod config;
pub mod models;
pub mod reactors;
pub mod routes;
pub mod store;

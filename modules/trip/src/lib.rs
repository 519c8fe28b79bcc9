//! Trip service
//!
//! Owns trip records. Creating a trip publishes `trip.requested`; the
//! service then follows `driver.assigned` and `pricing.quoted` to move the
//! trip forward, and publishes `trip.completed` when a trip is closed.

pub mod config;
pub mod models;
pub mod reactors;
pub mod routes;
pub mod store;

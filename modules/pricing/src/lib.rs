//! Pricing service
//!
//! Quotes every `trip.requested` with the configured fare rule and publishes
//! `pricing.quoted`. Also serves a quote preview over HTTP.

pub mod config;
pub mod fare;
pub mod reactors;
pub mod routes;

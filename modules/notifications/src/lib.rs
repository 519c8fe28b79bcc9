//! Notification service
//!
//! Tells the driver about an assignment and sends the rider a receipt when a
//! trip completes. Every notification is recorded and announced with
//! `notification.sent`.

pub mod config;
pub mod handlers;
pub mod log;
pub mod models;
pub mod routes;

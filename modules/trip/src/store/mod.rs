//! Trip persistence
//!
//! The trip store is the authoritative record of every trip. Both backends
//! apply state changes through [`TripUpdate::apply`] under a per-trip lock
//! (a map-wide write lock in memory, `SELECT ... FOR UPDATE` in Postgres).

mod memory;
mod postgres;

pub use memory::InMemoryTripStore;
pub use postgres::PostgresTripStore;

use crate::models::{Trip, TripUpdate};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("trip not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait TripStore: Send + Sync {
    /// Insert a new trip; fails if the id is already taken
    async fn create(&self, trip: Trip) -> Result<Trip, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Trip>, StoreError>;

    /// All trips, oldest first
    async fn list(&self) -> Result<Vec<Trip>, StoreError>;

    /// Apply `update` atomically and return the resulting trip
    async fn update(&self, id: &str, update: TripUpdate) -> Result<Trip, StoreError>;
}

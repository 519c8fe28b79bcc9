//! Driver persistence
//!
//! Besides the roster, the store records which driver each trip claimed.
//! [`DriverStore::claim_for_trip`] is the single atomic step behind driver
//! assignment: find the first available driver, mark it unavailable, and
//! record the assignment, or report why nothing was claimed.

mod memory;
mod postgres;

pub use memory::InMemoryDriverStore;
pub use postgres::PostgresDriverStore;

use crate::models::{Claim, Driver, DriverUpdate};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("driver not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait DriverStore: Send + Sync {
    /// Insert a new driver; fails if the id is already taken
    async fn create(&self, driver: Driver) -> Result<Driver, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Driver>, StoreError>;

    /// All drivers in creation order
    async fn list(&self) -> Result<Vec<Driver>, StoreError>;

    async fn update(&self, id: &str, update: DriverUpdate) -> Result<Driver, StoreError>;

    /// Atomically claim one available driver for `trip_id`
    ///
    /// Repeating the claim for the same trip never takes a second driver.
    async fn claim_for_trip(&self, trip_id: &str) -> Result<Claim, StoreError>;

    /// Driver recorded for a trip, if any
    async fn assignment(&self, trip_id: &str) -> Result<Option<String>, StoreError>;
}

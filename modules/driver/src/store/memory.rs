use super::{DriverStore, StoreError};
use crate::models::{Claim, Driver, DriverUpdate};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local driver store for development and tests
///
/// Drivers and assignments sit behind one mutex so a claim is a single
/// critical section.
#[derive(Default)]
pub struct InMemoryDriverStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Creation order
    drivers: Vec<Driver>,
    /// trip_id -> driver_id
    assignments: HashMap<String, String>,
}

impl State {
    fn find_mut(&mut self, id: &str) -> Option<&mut Driver> {
        self.drivers.iter_mut().find(|d| d.id == id)
    }
}

impl InMemoryDriverStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverStore for InMemoryDriverStore {
    async fn create(&self, driver: Driver) -> Result<Driver, StoreError> {
        let mut state = self.state.lock().await;
        if state.find_mut(&driver.id).is_some() {
            return Err(StoreError::Validation(format!(
                "driver {} already exists",
                driver.id
            )));
        }
        state.drivers.push(driver.clone());
        Ok(driver)
    }

    async fn get(&self, id: &str) -> Result<Option<Driver>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.drivers.iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Driver>, StoreError> {
        Ok(self.state.lock().await.drivers.clone())
    }

    async fn update(&self, id: &str, update: DriverUpdate) -> Result<Driver, StoreError> {
        let mut state = self.state.lock().await;
        let driver = state
            .find_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply(driver);
        Ok(driver.clone())
    }

    async fn claim_for_trip(&self, trip_id: &str) -> Result<Claim, StoreError> {
        let mut state = self.state.lock().await;

        if let Some(driver_id) = state.assignments.get(trip_id) {
            return Ok(Claim::AlreadyAssigned(driver_id.clone()));
        }

        let Some(driver) = state.drivers.iter_mut().find(|d| d.available) else {
            return Ok(Claim::NoneAvailable);
        };
        driver.available = false;
        driver.updated_at = Utc::now();
        let claimed = driver.clone();

        state
            .assignments
            .insert(trip_id.to_string(), claimed.id.clone());
        Ok(Claim::Assigned(claimed))
    }

    async fn assignment(&self, trip_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().await.assignments.get(trip_id).cloned())
    }
}

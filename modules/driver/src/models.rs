use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// A new, not yet available driver
    ///
    /// The name is trimmed and must be 1 to 100 characters long.
    pub fn new(name: &str) -> Result<Self, StoreError> {
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > MAX_NAME_LEN {
            return Err(StoreError::Validation(format!(
                "name must be between 1 and {} characters",
                MAX_NAME_LEN
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            available: false,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A change to an existing driver
#[derive(Debug, Clone, PartialEq)]
pub enum DriverUpdate {
    SetAvailable(bool),
}

impl DriverUpdate {
    pub fn apply(&self, driver: &mut Driver) {
        match self {
            DriverUpdate::SetAvailable(available) => driver.available = *available,
        }
        driver.updated_at = Utc::now();
    }
}

/// Outcome of trying to claim a driver for a trip
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The driver was marked unavailable and recorded against the trip
    Assigned(Driver),
    /// The trip already holds this driver; nothing changed
    AlreadyAssigned(String),
    NoneAvailable,
}

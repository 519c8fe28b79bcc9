use super::{StoreError, TripStore};
use crate::models::{Trip, TripUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local trip store for development and tests
#[derive(Default)]
pub struct InMemoryTripStore {
    trips: RwLock<HashMap<String, Trip>>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn create(&self, trip: Trip) -> Result<Trip, StoreError> {
        let mut trips = self.trips.write().await;
        if trips.contains_key(&trip.id) {
            return Err(StoreError::Validation(format!(
                "trip {} already exists",
                trip.id
            )));
        }
        trips.insert(trip.id.clone(), trip.clone());
        Ok(trip)
    }

    async fn get(&self, id: &str) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Trip>, StoreError> {
        let mut trips: Vec<Trip> = self.trips.read().await.values().cloned().collect();
        trips.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(trips)
    }

    async fn update(&self, id: &str, update: TripUpdate) -> Result<Trip, StoreError> {
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        // Apply to a copy so a rejected update leaves the stored trip untouched
        let mut updated = trip.clone();
        update.apply(&mut updated)?;
        *trip = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TripStatus;
    use event_consumer::LatLng;

    fn trip() -> Trip {
        Trip::new("r1", LatLng::new(55.0, 12.0), LatLng::new(55.1, 12.1))
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let store = InMemoryTripStore::new();
        let first = store.create(trip()).await.unwrap();
        let second = store.create(trip()).await.unwrap();

        assert_eq!(store.get(&first.id).await.unwrap(), Some(first.clone()));
        assert_eq!(store.get("nope").await.unwrap(), None);

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryTripStore::new();
        let t = store.create(trip()).await.unwrap();
        assert!(matches!(store.create(t).await, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_missing_trip() {
        let store = InMemoryTripStore::new();
        let result = store.update("missing", TripUpdate::SetEstimate(99.0)).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_trip_unchanged() {
        let store = InMemoryTripStore::new();
        let t = store.create(trip()).await.unwrap();
        store
            .update(&t.id, TripUpdate::AssignDriver("d1".into()))
            .await
            .unwrap();

        let result = store
            .update(&t.id, TripUpdate::AssignDriver("d2".into()))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidTransition(_))));

        let stored = store.get(&t.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::Assigned);
        assert_eq!(stored.assigned_driver_id.as_deref(), Some("d1"));
    }
}

//! Ride flow across trip, driver, pricing and notification services
//!
//! All services share one in-memory exchange; each has its own connection.
//!
//! Run with: cargo test -p e2e-tests --test ride_flow_e2e

mod common;

use driver_rs::store::DriverStore;
use event_bus::{Event, EventName};
use event_consumer::{EventContract, LatLng, TripRequested};
use futures::StreamExt;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use trip_rs::models::TripStatus;
use trip_rs::store::TripStore;

fn trip_body(rider_id: &str) -> serde_json::Value {
    json!({
        "rider_id": rider_id,
        "pickup": {"lat": 55.0, "lng": 12.0},
        "dropoff": {"lat": 55.1, "lng": 12.1}
    })
}

#[tokio::test]
async fn test_trip_requested_assigns_the_only_available_driver() {
    let platform = common::setup().await;
    platform.add_driver("d1", true).await;
    let mut assigned = common::observe(&platform.bus, "driver.assigned").await;

    let requested = TripRequested {
        trip_id: "t1".to_string(),
        rider_id: "r1".to_string(),
        pickup: LatLng::new(55.0, 12.0),
        dropoff: LatLng::new(55.1, 12.1),
    };
    platform
        .probe
        .publish(&requested.to_event("trip-service"))
        .await
        .unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(2), assigned.next())
        .await
        .expect("driver.assigned published")
        .unwrap();
    let event = Event::decode(&delivery.message.payload).unwrap();
    assert_eq!(event.name, EventName::DriverAssigned);
    assert_eq!(
        serde_json::Value::Object(event.payload.clone()),
        json!({"trip_id": "t1", "driver_id": "d1"})
    );

    let d1 = platform.drivers.get("d1").await.unwrap().unwrap();
    assert!(!d1.available);
    platform.shutdown().await;
}

#[tokio::test]
async fn test_full_ride_through_http() {
    let platform = common::setup().await;

    let (status, driver) = common::call(
        &platform.driver_api,
        common::post_json("/api/drivers", json!({"name": "Anna", "available": true})),
    )
    .await;
    assert_eq!(status, 201);
    let driver_id = driver["id"].as_str().unwrap().to_string();

    let (status, created) = common::call(
        &platform.trip_api,
        common::post_json("/api/trips", trip_body("r1")),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(created["published"], "trip.requested");
    let trip_id = created["trip"]["id"].as_str().unwrap().to_string();

    // Assignment and pricing arrive independently, in any order
    let trips = platform.trips.clone();
    let id = trip_id.clone();
    assert!(
        common::eventually(|| {
            let trips = trips.clone();
            let id = id.clone();
            async move {
                let trip = trips.get(&id).await.unwrap().unwrap();
                trip.status == TripStatus::Assigned && trip.estimated_price_dkk.is_some()
            }
        })
        .await,
        "trip should be assigned and priced"
    );

    let trip = platform.trips.get(&trip_id).await.unwrap().unwrap();
    assert_eq!(trip.assigned_driver_id.as_deref(), Some(driver_id.as_str()));
    assert!(trip.estimated_price_dkk.unwrap() > 45.0);

    let (_, fetched) = common::call(
        &platform.driver_api,
        common::get(&format!("/api/drivers/{}", driver_id)),
    )
    .await;
    assert_eq!(fetched["available"], false);

    let (status, completed) = common::call(
        &platform.trip_api,
        common::post_json(
            &format!("/api/trips/{}/complete", trip_id),
            json!({"final_price_dkk": 150.0}),
        ),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(completed["status"], "COMPLETED");

    // Push to the driver on assignment, SMS receipt to the rider on completion
    let log = platform.notifications.clone();
    let id = trip_id.clone();
    assert!(
        common::eventually(|| {
            let log = log.clone();
            let id = id.clone();
            async move { log.list(Some(id.as_str())).await.len() == 2 }
        })
        .await
    );
    let sent = platform.notifications.list(Some(trip_id.as_str())).await;
    let recipients: HashSet<_> = sent.iter().map(|n| n.recipient_id.as_str()).collect();
    assert_eq!(recipients, HashSet::from([driver_id.as_str(), "r1"]));

    assert_eq!(platform.bus.rejected_count(), 0);
    platform.shutdown().await;
}

#[tokio::test]
async fn test_no_drivers_leaves_trip_requested() {
    let platform = common::setup().await;
    let mut assigned = common::observe(&platform.bus, "driver.assigned").await;

    let (status, created) = common::call(
        &platform.trip_api,
        common::post_json("/api/trips", trip_body("r1")),
    )
    .await;
    assert_eq!(status, 201);
    let trip_id = created["trip"]["id"].as_str().unwrap().to_string();

    // Pricing still quotes the trip
    let trips = platform.trips.clone();
    let id = trip_id.clone();
    assert!(
        common::eventually(|| {
            let trips = trips.clone();
            let id = id.clone();
            async move {
                trips
                    .get(&id)
                    .await
                    .unwrap()
                    .is_some_and(|t| t.estimated_price_dkk.is_some())
            }
        })
        .await
    );

    let next = tokio::time::timeout(Duration::from_millis(200), assigned.next()).await;
    assert!(next.is_err(), "no driver.assigned expected");

    let trip = platform.trips.get(&trip_id).await.unwrap().unwrap();
    assert_eq!(trip.status, TripStatus::Requested);
    assert!(trip.assigned_driver_id.is_none());
    assert!(platform.notifications.list(None).await.is_empty());
    assert_eq!(platform.bus.rejected_count(), 0);
    platform.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_requests_never_share_a_driver() {
    let platform = common::setup().await;
    for id in ["d1", "d2", "d3"] {
        platform.add_driver(id, true).await;
    }

    let mut requests = Vec::new();
    for i in 0..6 {
        let api = platform.trip_api.clone();
        requests.push(tokio::spawn(async move {
            common::call(&api, common::post_json("/api/trips", trip_body(&format!("r{}", i)))).await
        }));
    }
    for request in requests {
        let (status, _) = request.await.unwrap();
        assert_eq!(status, 201);
    }

    let trips = platform.trips.clone();
    assert!(
        common::eventually(|| {
            let trips = trips.clone();
            async move {
                trips
                    .list()
                    .await
                    .unwrap()
                    .iter()
                    .filter(|t| t.status == TripStatus::Assigned)
                    .count()
                    == 3
            }
        })
        .await
    );

    // Let any stray deliveries settle before checking nothing else changed
    tokio::time::sleep(Duration::from_millis(100)).await;

    let assigned: Vec<String> = platform
        .trips
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|t| t.assigned_driver_id)
        .collect();
    let unique: HashSet<_> = assigned.iter().cloned().collect();
    assert_eq!(assigned.len(), 3);
    assert_eq!(unique, HashSet::from(["d1".to_string(), "d2".to_string(), "d3".to_string()]));

    for driver in platform.drivers.list().await.unwrap() {
        assert!(!driver.available);
    }
    platform.shutdown().await;
}

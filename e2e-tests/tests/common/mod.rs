#![allow(dead_code)]

//! All four services wired to one in-memory exchange
//!
//! Each service gets its own connection and broker client, exactly as
//! separate processes would against a shared broker.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::Utc;
use driver_rs::models::Driver;
use driver_rs::reactors::DriverReactor;
use driver_rs::store::{DriverStore, InMemoryDriverStore};
use event_bus::{BrokerClient, EventBus, InMemoryBus, RetryConfig};
use http_body_util::BodyExt;
use notifications_rs::handlers::NotificationReactor;
use notifications_rs::log::NotificationLog;
use pricing_rs::fare::FareRule;
use pricing_rs::reactors::PricingReactor;
use std::sync::{Arc, Once};
use std::time::Duration;
use tower::ServiceExt;
use trip_rs::reactors::TripReactor;
use trip_rs::store::{InMemoryTripStore, TripStore};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub struct Platform {
    pub bus: InMemoryBus,
    pub trips: Arc<dyn TripStore>,
    pub drivers: Arc<dyn DriverStore>,
    pub notifications: Arc<NotificationLog>,
    pub trip: Arc<BrokerClient>,
    pub driver: Arc<BrokerClient>,
    pub pricing: Arc<BrokerClient>,
    pub notification: Arc<BrokerClient>,
    pub trip_api: Router,
    pub driver_api: Router,
    /// Connection for publishing events by hand
    pub probe: Arc<BrokerClient>,
}

pub async fn broker(bus: &InMemoryBus) -> Arc<BrokerClient> {
    let broker = Arc::new(BrokerClient::new(
        Arc::new(bus.new_connection()),
        RetryConfig::fixed(1, Duration::from_millis(1)),
    ));
    broker.connect().await.expect("in-memory bus connects");
    broker
}

/// Start the trip service's subscriptions on a fresh connection
pub async fn start_trip_service(bus: &InMemoryBus, store: Arc<dyn TripStore>) -> Arc<BrokerClient> {
    let broker = broker(bus).await;
    trip_rs::reactors::registry(Arc::new(TripReactor::new(store)))
        .expect("trip registry")
        .start(&broker)
        .await
        .expect("trip subscriptions");
    broker
}

pub async fn setup() -> Platform {
    init_tracing();
    let bus = InMemoryBus::new();

    let trips: Arc<dyn TripStore> = Arc::new(InMemoryTripStore::new());
    let trip = start_trip_service(&bus, trips.clone()).await;
    let trip_api = trip_rs::routes::router(trip_rs::routes::AppState::new(
        trips.clone(),
        trip.clone(),
        "trip-service",
    ));

    let drivers: Arc<dyn DriverStore> = Arc::new(InMemoryDriverStore::new());
    let driver = broker(&bus).await;
    driver_rs::reactors::registry(Arc::new(DriverReactor::new(
        drivers.clone(),
        driver.clone(),
        "driver-service",
    )))
    .expect("driver registry")
    .start(&driver)
    .await
    .expect("driver subscriptions");
    let driver_api = driver_rs::routes::router(driver_rs::routes::AppState::new(
        drivers.clone(),
        driver.clone(),
        "driver-service",
    ));

    let pricing = broker(&bus).await;
    pricing_rs::reactors::registry(Arc::new(PricingReactor::new(
        FareRule::default(),
        pricing.clone(),
        "pricing-service",
    )))
    .expect("pricing registry")
    .start(&pricing)
    .await
    .expect("pricing subscriptions");

    let notifications = Arc::new(NotificationLog::new());
    let notification = broker(&bus).await;
    notifications_rs::handlers::registry(Arc::new(NotificationReactor::new(
        notifications.clone(),
        notification.clone(),
        "notification-service",
    )))
    .expect("notification registry")
    .start(&notification)
    .await
    .expect("notification subscriptions");

    let probe = broker(&bus).await;

    Platform {
        bus,
        trips,
        drivers,
        notifications,
        trip,
        driver,
        pricing,
        notification,
        trip_api,
        driver_api,
        probe,
    }
}

impl Platform {
    /// Add a driver with a fixed id
    pub async fn add_driver(&self, id: &str, available: bool) -> Driver {
        let now = Utc::now();
        self.drivers
            .create(Driver {
                id: id.to_string(),
                name: format!("Driver {}", id),
                available,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("driver created")
    }

    pub async fn shutdown(&self) {
        for broker in [&self.trip, &self.driver, &self.pricing, &self.notification, &self.probe] {
            broker.close().await.expect("broker closes");
        }
    }
}

/// Observe an event name on a private queue of the shared exchange
pub async fn observe(
    bus: &InMemoryBus,
    event_name: &str,
) -> futures::stream::BoxStream<'static, event_bus::Delivery> {
    let connection = bus.new_connection();
    connection.connect().await.expect("observer connects");
    connection
        .subscribe(event_name, &format!("observer.{}", event_name.replace('.', "-")))
        .await
        .expect("observer subscribes")
}

pub async fn call(router: &Router, request: Request<Body>) -> (u16, serde_json::Value) {
    let response: Response<Body> = router.clone().oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Poll until `condition` holds or two seconds have passed
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#![allow(dead_code)]

use axum::body::Body;
use axum::Router;
use event_bus::{BrokerClient, InMemoryBus, RetryConfig};
use http_body_util::BodyExt;
use notifications_rs::handlers::{registry, NotificationReactor};
use notifications_rs::log::NotificationLog;
use notifications_rs::routes::{router, AppState};
use std::sync::Arc;
use std::time::Duration;

pub struct TestApp {
    pub bus: InMemoryBus,
    pub broker: Arc<BrokerClient>,
    pub log: Arc<NotificationLog>,
    pub router: Router,
}

/// Notification service with its subscriptions started on an in-memory bus
pub async fn setup() -> TestApp {
    let bus = InMemoryBus::new();
    let broker = Arc::new(BrokerClient::new(
        Arc::new(bus.clone()),
        RetryConfig::fixed(1, Duration::from_millis(1)),
    ));
    broker.connect().await.expect("in-memory bus connects");

    let log = Arc::new(NotificationLog::new());
    let reactor = Arc::new(NotificationReactor::new(
        log.clone(),
        broker.clone(),
        "notification-service",
    ));
    registry(reactor)
        .expect("registry builds")
        .start(&broker)
        .await
        .expect("subscriptions start");

    let router = router(AppState::new(log.clone(), broker.clone(), "notification-service"));

    TestApp {
        bus,
        broker,
        log,
        router,
    }
}

/// Read response body as JSON.
pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until `condition` holds or a second has passed
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#![allow(dead_code)]

use axum::body::Body;
use axum::Router;
use event_bus::{BrokerClient, InMemoryBus, RetryConfig};
use http_body_util::BodyExt;
use pricing_rs::fare::FareRule;
use pricing_rs::routes::{router, AppState};
use std::sync::Arc;
use std::time::Duration;

pub struct TestApp {
    pub bus: InMemoryBus,
    pub broker: Arc<BrokerClient>,
    pub router: Router,
}

/// Pricing API with the default fare rule over a connected in-memory bus
pub async fn setup() -> TestApp {
    let bus = InMemoryBus::new();
    let broker = Arc::new(BrokerClient::new(
        Arc::new(bus.clone()),
        RetryConfig::fixed(1, Duration::from_millis(1)),
    ));
    broker.connect().await.expect("in-memory bus connects");

    let router = router(AppState::new(
        FareRule::default(),
        broker.clone(),
        "pricing-service",
    ));

    TestApp {
        bus,
        broker,
        router,
    }
}

/// Read response body as JSON.
pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

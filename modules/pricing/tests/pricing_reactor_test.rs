mod common;

use event_bus::{Event, EventBus, EventName};
use event_consumer::{EventContract, LatLng, PricingQuoted, TripRequested};
use futures::StreamExt;
use pricing_rs::fare::FareRule;
use pricing_rs::reactors::{registry, PricingReactor};
use std::sync::Arc;
use std::time::Duration;

fn requested(trip_id: &str, pickup: LatLng, dropoff: LatLng) -> Event {
    TripRequested {
        trip_id: trip_id.to_string(),
        rider_id: "r1".to_string(),
        pickup,
        dropoff,
    }
    .to_event("trip-service")
}

#[tokio::test]
async fn test_trip_requested_publishes_quote() {
    let app = common::setup().await;

    let observer = app.bus.new_connection();
    observer.connect().await.unwrap();
    let mut quotes = observer
        .subscribe("pricing.quoted", "test.pricing-quoted")
        .await
        .unwrap();

    let reactor = Arc::new(PricingReactor::new(
        FareRule::default(),
        app.broker.clone(),
        "pricing-service",
    ));
    let registry = registry(reactor).unwrap();
    assert_eq!(
        registry.queues(),
        vec![(EventName::TripRequested, "pricing.trip-requested".to_string())]
    );
    registry.start(&app.broker).await.unwrap();

    let pickup = LatLng::new(55.0, 12.0);
    let dropoff = LatLng::new(55.1, 12.1);
    app.broker
        .publish(&requested("t1", pickup, dropoff))
        .await
        .unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(1), quotes.next())
        .await
        .expect("pricing.quoted published")
        .unwrap();
    let event = Event::decode(&delivery.message.payload).unwrap();
    assert_eq!(event.source, "pricing-service");

    let quoted = PricingQuoted::from_event(&event).unwrap();
    let expected = FareRule::default().fare(pickup, dropoff);
    assert_eq!(quoted.trip_id, "t1");
    assert_eq!(quoted.estimated_price_dkk, expected.estimated_price_dkk);
    assert_eq!(quoted.distance_km, Some(expected.distance_km));
    assert_eq!(quoted.currency.as_deref(), Some("DKK"));

    app.broker.close().await.unwrap();
}

#[tokio::test]
async fn test_publish_failure_is_a_handler_error() {
    let app = common::setup().await;
    app.broker.close().await.unwrap();

    let reactor = PricingReactor::new(FareRule::default(), app.broker.clone(), "pricing-service");
    let event = requested("t1", LatLng::new(55.0, 12.0), LatLng::new(55.1, 12.1));
    let contract = TripRequested::from_event(&event).unwrap();

    let result = event_consumer::Reactor::<TripRequested>::react(&reactor, &event, contract).await;
    assert!(result.is_err());
}

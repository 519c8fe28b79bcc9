mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = common::setup().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert_eq!(json["service"], "pricing-service");
    assert_eq!(json["broker"], "connected");
}

#[tokio::test]
async fn test_preview_quote() {
    let app = common::setup().await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/quotes",
            json!({
                "trip_id": "t1",
                "pickup": {"lat": 55.0, "lng": 12.0},
                "dropoff": {"lat": 55.0, "lng": 12.0}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert_eq!(json["trip_id"], "t1");
    assert_eq!(json["estimated_price_dkk"], 45.0);
    assert_eq!(json["base_fare"], 25.0);
    assert_eq!(json["distance_km"], 0.0);
    assert_eq!(json["currency"], "DKK");
}

#[tokio::test]
async fn test_preview_without_trip_id_publishes_nothing() {
    let app = common::setup().await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/quotes",
            json!({
                "pickup": {"lat": 55.0, "lng": 12.0},
                "dropoff": {"lat": 55.1, "lng": 12.1}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert!(json.get("trip_id").is_none());
    assert!(json["estimated_price_dkk"].as_f64().unwrap() > 45.0);
    assert_eq!(app.bus.queue_depth("pricing.trip-requested").await, None);
}

#[tokio::test]
async fn test_preview_validation() {
    let app = common::setup().await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/quotes",
            json!({
                "pickup": {"lat": 55.0, "lng": 200.0},
                "dropoff": {"lat": 55.1, "lng": 12.1}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(common::body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("pickup.lng"));

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/quotes", json!({"pickup": {"lat": 1.0}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

use std::sync::Arc;

use assert_json_diff::assert_json_include;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use time::macros::datetime;
use tower::ServiceExt;

use fleet_common::envelope::{Protocol, UNKNOWN_VENDOR};
use fleet_common::health_score::evaluate;
use fleet_common::store::{MemoryTwinStore, TwinStore};
use fleet_common::time::FixedClock;
use fleet_common::twin::{DigitalTwinState, HealthState};
use health::HealthRegistry;
use ingest::adapter::JsonTelemetryAdapter;
use ingest::router::router;
use ingest::sinks::{FailingSink, MemorySink, TelemetrySink};

const NOW: time::OffsetDateTime = datetime!(2026-01-25 18:32:46 UTC);
const TWIN_TTL: time::Duration = time::Duration::seconds(120);

struct Harness {
    app: Router,
    sink: Arc<MemorySink>,
    store: Arc<MemoryTwinStore>,
}

fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(NOW));
    let sink = Arc::new(MemorySink::default());
    let store = Arc::new(MemoryTwinStore::new(clock.clone()));
    let app = router(
        clock,
        Arc::new(JsonTelemetryAdapter {}),
        HealthRegistry::new("liveness"),
        sink.clone(),
        store.clone(),
        false,
    );
    Harness { app, sink, store }
}

fn failing_harness() -> Router {
    let clock = Arc::new(FixedClock::new(NOW));
    let sink: Arc<dyn TelemetrySink> = Arc::new(FailingSink {});
    let store = Arc::new(MemoryTwinStore::new(clock.clone()));
    router(
        clock,
        Arc::new(JsonTelemetryAdapter {}),
        HealthRegistry::new("liveness"),
        sink,
        store,
        false,
    )
}

fn post_telemetry(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/telemetry")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn twin(vehicle_id: &str, soc: Option<f64>, temp: Option<f64>, online: bool) -> DigitalTwinState {
    let mut twin = DigitalTwinState {
        vehicle_id: vehicle_id.to_string(),
        vendor: "TESLA".to_string(),
        last_seen: NOW,
        online,
        telemetry: Default::default(),
        health_score: 0,
        health_state: HealthState::Critical,
    };
    twin.telemetry.battery_soc_pct = soc;
    twin.telemetry.battery_temp_c = temp;
    let health = evaluate(&twin);
    twin.health_score = health.score;
    twin.health_state = health.state;
    twin
}

#[tokio::test]
async fn it_accepts_a_flattened_payload() {
    let harness = harness();

    let response = harness
        .app
        .oneshot(post_telemetry(
            r#"{"vehicle_id":"EV-001","timestamp":"2026-01-25T18:32:45Z","speed_kmph":62.0,"battery_soc_pct":78.5,"battery_temp_c":31.2}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_json_include!(
        actual: json_body(response).await,
        expected: json!({"status": "Accepted"})
    );

    let events = harness.sink.captured();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].schema_version, "1.0");
    assert_eq!(events[0].vehicle_id, "EV-001");
    assert_eq!(events[0].vendor, UNKNOWN_VENDOR);
    assert_eq!(events[0].event_timestamp, datetime!(2026-01-25 18:32:45 UTC));
    assert_eq!(events[0].ingestion_timestamp, NOW);
    assert_eq!(events[0].connection.protocol, Protocol::Rest);
    let telemetry = events[0].telemetry.as_ref().unwrap();
    assert_eq!(telemetry.battery_soc_pct, Some(78.5));
    assert_eq!(telemetry.motor_temp_c, None);
}

#[tokio::test]
async fn it_rejects_malformed_json_with_400() {
    let harness = harness();

    let response = harness
        .app
        .oneshot(post_telemetry("not json at all"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.sink.captured().is_empty());
}

#[tokio::test]
async fn it_rejects_missing_vehicle_id_with_400() {
    let harness = harness();

    let response = harness
        .app
        .oneshot(post_telemetry(
            r#"{"timestamp":"2026-01-25T18:32:45Z","battery_soc_pct":78.5}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn it_rejects_missing_soc_with_422() {
    let harness = harness();

    let response = harness
        .app
        .oneshot(post_telemetry(
            r#"{"vehicle_id":"EV-001","timestamp":"2026-01-25T18:32:45Z","speed_kmph":62.0}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        String::from_utf8_lossy(&bytes),
        "validation failed: battery_soc_pct is required"
    );
}

#[tokio::test]
async fn it_returns_503_when_the_stream_is_down() {
    let app = failing_harness();

    let response = app
        .oneshot(post_telemetry(
            r#"{"vehicle_id":"EV-001","timestamp":"2026-01-25T18:32:45Z","battery_soc_pct":78.5}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn it_serves_a_single_twin() {
    let harness = harness();
    harness
        .store
        .set_with_ttl(&twin("EV-007", Some(64.0), Some(33.0), true), TWIN_TTL)
        .await
        .unwrap();

    let response = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/v1/vehicles/EV-007")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_json_include!(
        actual: json_body(response).await,
        expected: json!({
            "vehicle_id": "EV-007",
            "vendor": "TESLA",
            "online": true,
            "health_score": 100,
            "health_state": "HEALTHY",
            "telemetry": {"battery_soc_pct": 64.0}
        })
    );
}

#[tokio::test]
async fn it_returns_404_for_unknown_vehicles() {
    let harness = harness();

    let response = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/v1/vehicles/EV-404")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn it_summarizes_the_fleet() {
    let harness = harness();
    let samples = [
        twin("EV-001", Some(90.0), Some(30.0), true), // healthy
        twin("EV-002", Some(20.0), Some(30.0), true), // degraded, low battery
        twin("EV-003", Some(10.0), Some(60.0), true), // critical on two counts
        twin("EV-004", Some(90.0), Some(30.0), false), // offline, critical
    ];
    for twin in &samples {
        harness.store.set_with_ttl(twin, TWIN_TTL).await.unwrap();
    }

    let response = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/v1/fleet/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_json_include!(
        actual: json_body(response).await,
        expected: json!({
            "total_vehicles": 4,
            "online_vehicles": 3,
            "healthy": 1,
            "degraded": 1,
            "critical": 2
        })
    );
}

#[tokio::test]
async fn it_lists_fleet_vehicles_sorted_by_id() {
    let harness = harness();
    harness
        .store
        .set_with_ttl(&twin("EV-B", Some(90.0), None, true), TWIN_TTL)
        .await
        .unwrap();
    harness
        .store
        .set_with_ttl(&twin("EV-A", Some(10.0), None, true), TWIN_TTL)
        .await
        .unwrap();

    let response = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/v1/fleet/vehicles")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let vehicles = body.as_array().unwrap();
    assert_eq!(vehicles.len(), 2);
    assert_json_include!(
        actual: vehicles[0].clone(),
        expected: json!({"vehicle_id": "EV-A", "health_state": "CRITICAL", "battery_soc_pct": 10.0})
    );
    assert_json_include!(
        actual: vehicles[1].clone(),
        expected: json!({"vehicle_id": "EV-B", "health_state": "HEALTHY"})
    );
}

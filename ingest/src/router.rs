use std::future::ready;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::{
    routing::{get, post},
    Router,
};
use health::HealthRegistry;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use fleet_common::store::TwinStore;
use fleet_common::time::TimeSource;

use crate::adapter::TelemetryAdapter;
use crate::fleet;
use crate::sinks::TelemetrySink;
use crate::telemetry;

// Vendor payloads are small, anything bigger is garbage or abuse.
const MAX_TELEMETRY_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct State {
    pub sink: Arc<dyn TelemetrySink>,
    pub store: Arc<dyn TwinStore>,
    pub timesource: Arc<dyn TimeSource>,
    pub adapter: Arc<dyn TelemetryAdapter>,
}

async fn index() -> &'static str {
    "fleet-ingest"
}

pub fn router(
    timesource: Arc<dyn TimeSource>,
    adapter: Arc<dyn TelemetryAdapter>,
    liveness: HealthRegistry,
    sink: Arc<dyn TelemetrySink>,
    store: Arc<dyn TwinStore>,
    metrics: bool,
) -> Router {
    let state = State {
        sink,
        store,
        timesource,
        adapter,
    };

    // Devices post from embedded stacks and fleet dashboards read from
    // browsers, so accept cross-origin requests on both surfaces.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .allow_origin(AllowOrigin::mirror_request());

    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .route(
            "/api/v1/telemetry",
            post(telemetry::ingest).layer(DefaultBodyLimit::max(MAX_TELEMETRY_BODY_BYTES)),
        )
        .route("/api/v1/vehicles/:vehicle_id", get(fleet::get_vehicle))
        .route("/api/v1/fleet/summary", get(fleet::fleet_summary))
        .route("/api/v1/fleet/vehicles", get(fleet::list_vehicles))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            fleet_common::metrics::track_metrics,
        ))
        .with_state(state);

    // Don't install metrics unless asked, as they break the node exporter
    if metrics {
        router.merge(fleet_common::metrics::setup_metrics_router())
    } else {
        router
    }
}

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use metrics::counter;
use tracing::{error, instrument, Span};

use crate::api::{IngestError, IngestResponse, IngestResponseCode};
use crate::router;
use crate::validation::validate;

/// Accepts one raw vendor payload, normalizes it to the canonical envelope
/// and publishes it to the stream. The HTTP status maps the failure mode:
/// 400 for unreadable payloads, 422 for business-rule rejections and 503
/// when the stream is unavailable and the device should retry.
#[instrument(skip_all, fields(vehicle_id))]
pub async fn ingest(
    state: State<router::State>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), IngestError> {
    counter!("ingest_events_received_total", "protocol" => "rest").increment(1);

    let now = state.timesource.now();
    let envelope = state.adapter.adapt(&body, now).inspect_err(|e| {
        counter!("ingest_events_dropped_total", "cause" => "invalid_payload").increment(1);
        error!("rejected payload: {}", e);
    })?;
    Span::current().record("vehicle_id", &envelope.vehicle_id);

    validate(&envelope).inspect_err(|e| {
        counter!("ingest_events_dropped_total", "cause" => "validation_failed").increment(1);
        error!("rejected envelope: {}", e);
    })?;

    state.sink.publish(envelope).await.inspect_err(|_| {
        counter!("ingest_events_dropped_total", "cause" => "publish_error").increment(1);
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: IngestResponseCode::Accepted,
        }),
    ))
}

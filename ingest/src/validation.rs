use fleet_common::envelope::CanonicalTelemetryEnvelope;

use crate::api::IngestError;

/// Business-rule preconditions on an adapted envelope, checked before the
/// event may enter the stream. Fails fast on the first violated rule and
/// never mutates the envelope.
///
/// Envelope presence and the event timestamp are enforced by construction
/// (the adapter cannot produce an envelope without them), so only the rules
/// the type system cannot express are checked here.
pub fn validate(envelope: &CanonicalTelemetryEnvelope) -> Result<(), IngestError> {
    if envelope.vehicle_id.trim().is_empty() {
        return Err(IngestError::ValidationFailed(
            "vehicle_id is required".to_string(),
        ));
    }

    // Battery state of charge is the one measurement every reading must carry
    match &envelope.telemetry {
        Some(telemetry) if telemetry.battery_soc_pct.is_some() => Ok(()),
        _ => Err(IngestError::ValidationFailed(
            "battery_soc_pct is required".to_string(),
        )),
    }
}

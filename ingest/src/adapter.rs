use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use fleet_common::envelope::{
    CanonicalTelemetryEnvelope, ConnectionMetadata, Protocol, TelemetrySnapshot, SCHEMA_VERSION,
    UNKNOWN_VENDOR,
};

use crate::api::IngestError;

/// Turns one transport-specific raw payload into a canonical envelope.
///
/// Adapters are transport-agnostic: the REST handler and the MQTT bridge both
/// go through the same implementation, and protocol-specific post-processing
/// (overwriting the connection tag) is done by the caller afterwards.
pub trait TelemetryAdapter: Send + Sync {
    fn adapt(
        &self,
        raw: &[u8],
        now: OffsetDateTime,
    ) -> Result<CanonicalTelemetryEnvelope, IngestError>;
}

/// Vendor payloads come in two shapes: measurements nested under a
/// `telemetry` object, or flattened at the top level next to `vehicle_id`.
/// Both deserialize into this; nested wins when both are present.
#[derive(Debug, Default, Deserialize)]
struct RawTelemetry {
    battery_soc_pct: Option<f64>,
    speed_kmph: Option<f64>,
    battery_temp_c: Option<f64>,
    motor_temp_c: Option<f64>,
    ambient_temp_c: Option<f64>,
    odometer_km: Option<f64>,
}

impl RawTelemetry {
    fn into_snapshot(self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            battery_soc_pct: self.battery_soc_pct,
            speed_kmph: self.speed_kmph,
            battery_temp_c: self.battery_temp_c,
            motor_temp_c: self.motor_temp_c,
            ambient_temp_c: self.ambient_temp_c,
            odometer_km: self.odometer_km,
        }
    }
}

#[derive(Deserialize)]
struct RawPayload {
    vehicle_id: Option<String>,
    timestamp: Option<String>,
    vendor: Option<String>,
    telemetry: Option<RawTelemetry>,
    #[serde(flatten)]
    inline: RawTelemetry,
}

#[derive(Clone, Default)]
pub struct JsonTelemetryAdapter {}

impl TelemetryAdapter for JsonTelemetryAdapter {
    /// Pure transform given `now`; `now` becomes the ingestion stamp and is
    /// never taken from the payload. Only structural problems fail here
    /// (unparseable JSON, missing ids/timestamps); field-level business rules
    /// are deferred to validation.
    fn adapt(
        &self,
        raw: &[u8],
        now: OffsetDateTime,
    ) -> Result<CanonicalTelemetryEnvelope, IngestError> {
        debug!(len = raw.len(), "adapting raw telemetry payload");

        let payload: RawPayload = serde_json::from_slice(raw)
            .map_err(|e| IngestError::InvalidPayload(format!("malformed JSON payload: {e}")))?;

        let vehicle_id = payload
            .vehicle_id
            .ok_or_else(|| IngestError::InvalidPayload("vehicle_id is required".to_string()))?;

        let timestamp = payload
            .timestamp
            .ok_or_else(|| IngestError::InvalidPayload("timestamp is required".to_string()))?;
        let event_timestamp = OffsetDateTime::parse(&timestamp, &Rfc3339).map_err(|_| {
            IngestError::InvalidPayload(format!(
                "timestamp '{timestamp}' is not a valid RFC 3339 instant"
            ))
        })?;

        // Absent measurements stay unknown, they are never defaulted to 0
        let snapshot = payload
            .telemetry
            .unwrap_or(payload.inline)
            .into_snapshot();
        let telemetry = (!snapshot.is_empty()).then_some(snapshot);

        Ok(CanonicalTelemetryEnvelope {
            schema_version: SCHEMA_VERSION.to_string(),
            vehicle_id,
            vendor: payload.vendor.unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
            event_timestamp,
            ingestion_timestamp: now,
            telemetry,
            connection: ConnectionMetadata::for_protocol(Protocol::Rest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-01-25 18:32:46 UTC);

    fn adapt(raw: &str) -> Result<CanonicalTelemetryEnvelope, IngestError> {
        JsonTelemetryAdapter::default().adapt(raw.as_bytes(), NOW)
    }

    #[test]
    fn adapts_flattened_payload() {
        let envelope = adapt(
            r#"{"vehicle_id":"EV-001","timestamp":"2026-01-25T18:32:45Z","battery_soc_pct":78.5,"speed_kmph":64.2}"#,
        )
        .unwrap();

        assert_eq!(envelope.schema_version, "1.0");
        assert_eq!(envelope.vehicle_id, "EV-001");
        assert_eq!(envelope.vendor, "UNKNOWN");
        assert_eq!(envelope.event_timestamp, datetime!(2026-01-25 18:32:45 UTC));
        assert_eq!(envelope.ingestion_timestamp, NOW);
        assert_eq!(envelope.connection.protocol, Protocol::Rest);

        let telemetry = envelope.telemetry.unwrap();
        assert_eq!(telemetry.battery_soc_pct, Some(78.5));
        assert_eq!(telemetry.speed_kmph, Some(64.2));
        assert_eq!(telemetry.battery_temp_c, None);
    }

    #[test]
    fn adapts_nested_telemetry_object() {
        let envelope = adapt(
            r#"{"vehicle_id":"EV-002","vendor":"acme","timestamp":"2026-01-25T18:32:45Z",
                "telemetry":{"battery_soc_pct":42.0,"battery_temp_c":48.5,"odometer_km":10042.7}}"#,
        )
        .unwrap();

        assert_eq!(envelope.vendor, "acme");
        let telemetry = envelope.telemetry.unwrap();
        assert_eq!(telemetry.battery_soc_pct, Some(42.0));
        assert_eq!(telemetry.battery_temp_c, Some(48.5));
        assert_eq!(telemetry.odometer_km, Some(10042.7));
    }

    #[test]
    fn nested_telemetry_wins_over_flattened_fields() {
        let envelope = adapt(
            r#"{"vehicle_id":"EV-003","timestamp":"2026-01-25T18:32:45Z",
                "speed_kmph":99.9,"telemetry":{"battery_soc_pct":50.0}}"#,
        )
        .unwrap();

        let telemetry = envelope.telemetry.unwrap();
        assert_eq!(telemetry.battery_soc_pct, Some(50.0));
        assert_eq!(telemetry.speed_kmph, None);
    }

    #[test]
    fn payload_without_measurements_has_no_snapshot() {
        let envelope =
            adapt(r#"{"vehicle_id":"EV-004","timestamp":"2026-01-25T18:32:45Z"}"#).unwrap();
        assert!(envelope.telemetry.is_none());
    }

    #[test]
    fn rejects_non_json_payload() {
        let err = adapt("definitely not json").unwrap_err();
        assert!(matches!(err, IngestError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_missing_vehicle_id() {
        let err = adapt(r#"{"timestamp":"2026-01-25T18:32:45Z","battery_soc_pct":50}"#).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPayload(ref msg) if msg.contains("vehicle_id")));
    }

    #[test]
    fn rejects_missing_timestamp() {
        let err = adapt(r#"{"vehicle_id":"EV-001","battery_soc_pct":50}"#).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPayload(ref msg) if msg.contains("timestamp")));
    }

    #[test]
    fn rejects_malformed_timestamp() {
        let err =
            adapt(r#"{"vehicle_id":"EV-001","timestamp":"yesterday at noon"}"#).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPayload(ref msg) if msg.contains("RFC 3339")));
    }
}

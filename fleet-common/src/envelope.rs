use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Format tag stamped on every envelope. Single literal version, no
/// schema-registry negotiation.
pub const SCHEMA_VERSION: &str = "1.0";

/// Sentinel vendor tag used when the payload does not carry one.
pub const UNKNOWN_VENDOR: &str = "UNKNOWN";

/// The normalized, transport-agnostic representation of one telemetry
/// reading. Built once by the adapter, immutable afterwards (the MQTT entry
/// point overwrites the protocol tag before validation), and only ever
/// stream-resident: it is never written to the twin store directly.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CanonicalTelemetryEnvelope {
    pub schema_version: String,
    pub vehicle_id: String,
    pub vendor: String,
    #[serde(with = "time::serde::rfc3339")]
    pub event_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ingestion_timestamp: OffsetDateTime,
    pub telemetry: Option<TelemetrySnapshot>,
    pub connection: ConnectionMetadata,
}

impl CanonicalTelemetryEnvelope {
    /// Events are keyed by vehicle so that per-vehicle order is retained on
    /// one partition of the stream.
    pub fn partition_key(&self) -> &str {
        &self.vehicle_id
    }
}

/// One set of measurements. Every field is independently optional: absent
/// means unknown, and unknown measurements never trigger scoring penalties.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TelemetrySnapshot {
    pub speed_kmph: Option<f64>,
    pub battery_soc_pct: Option<f64>,
    pub battery_temp_c: Option<f64>,
    pub motor_temp_c: Option<f64>,
    pub ambient_temp_c: Option<f64>,
    pub odometer_km: Option<f64>,
}

impl TelemetrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.speed_kmph.is_none()
            && self.battery_soc_pct.is_none()
            && self.battery_temp_c.is_none()
            && self.motor_temp_c.is_none()
            && self.ambient_temp_c.is_none()
            && self.odometer_km.is_none()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Rest,
    Mqtt,
}

/// Transport metadata attached by the entry point, not by the vehicle.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ConnectionMetadata {
    pub protocol: Protocol,
    pub signal_strength: Option<i32>,
    pub sequence_number: Option<u64>,
    pub packet_loss_pct: Option<f64>,
    pub is_heartbeat: Option<bool>,
}

impl ConnectionMetadata {
    pub fn for_protocol(protocol: Protocol) -> Self {
        ConnectionMetadata {
            protocol,
            signal_strength: None,
            sequence_number: None,
            packet_loss_pct: None,
            is_heartbeat: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use serde_json::json;
    use time::macros::datetime;

    fn envelope() -> CanonicalTelemetryEnvelope {
        CanonicalTelemetryEnvelope {
            schema_version: SCHEMA_VERSION.to_string(),
            vehicle_id: "EV-001".to_string(),
            vendor: UNKNOWN_VENDOR.to_string(),
            event_timestamp: datetime!(2026-01-25 18:32:45 UTC),
            ingestion_timestamp: datetime!(2026-01-25 18:32:46 UTC),
            telemetry: Some(TelemetrySnapshot {
                battery_soc_pct: Some(78.5),
                speed_kmph: Some(64.2),
                ..Default::default()
            }),
            connection: ConnectionMetadata::for_protocol(Protocol::Rest),
        }
    }

    #[test]
    fn partition_key_is_the_vehicle_id() {
        assert_eq!(envelope().partition_key(), "EV-001");
    }

    #[test]
    fn serializes_protocol_and_timestamps_in_wire_format() {
        let value = serde_json::to_value(envelope()).unwrap();
        assert_json_include!(
            actual: value,
            expected: json!({
                "schema_version": "1.0",
                "vehicle_id": "EV-001",
                "event_timestamp": "2026-01-25T18:32:45Z",
                "connection": {"protocol": "REST"},
            })
        );
    }

    #[test]
    fn round_trips_through_the_stream_encoding() {
        let original = envelope();
        let bytes = serde_json::to_vec(&original).unwrap();
        let decoded: CanonicalTelemetryEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn snapshot_emptiness_tracks_all_fields() {
        assert!(TelemetrySnapshot::default().is_empty());
        let snapshot = TelemetrySnapshot {
            odometer_km: Some(1042.7),
            ..Default::default()
        };
        assert!(!snapshot.is_empty());
    }
}

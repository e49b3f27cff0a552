use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::envelope::TelemetrySnapshot;

/// The latest known good state for one vehicle. One entry per vehicle in the
/// expiring store; mutated in place on every accepted envelope and evicted by
/// the store TTL when a vehicle goes quiet.
///
/// Invariant: `last_seen` is monotonically non-decreasing across accepted
/// updates for a given vehicle (enforced by the updater's staleness guard).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DigitalTwinState {
    pub vehicle_id: String,
    pub vendor: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub online: bool,
    pub telemetry: TelemetrySnapshot,
    pub health_score: i32,
    pub health_state: HealthState,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
}

impl HealthState {
    /// Classification thresholds over the final score.
    pub fn from_score(score: i32) -> HealthState {
        match score {
            s if s >= 80 => HealthState::Healthy,
            s if s >= 50 => HealthState::Degraded,
            _ => HealthState::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundaries() {
        assert_eq!(HealthState::from_score(100), HealthState::Healthy);
        assert_eq!(HealthState::from_score(80), HealthState::Healthy);
        assert_eq!(HealthState::from_score(79), HealthState::Degraded);
        assert_eq!(HealthState::from_score(50), HealthState::Degraded);
        assert_eq!(HealthState::from_score(49), HealthState::Critical);
        assert_eq!(HealthState::from_score(0), HealthState::Critical);
    }

    #[test]
    fn health_state_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&HealthState::Degraded).unwrap(),
            "\"DEGRADED\""
        );
    }
}

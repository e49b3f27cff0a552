use std::sync::Arc;

use metrics::counter;
use time::Duration;
use tracing::{debug, instrument};

use fleet_common::envelope::CanonicalTelemetryEnvelope;
use fleet_common::health_score::evaluate;
use fleet_common::store::{StoreError, TwinStore};
use fleet_common::twin::DigitalTwinState;

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Stale,
}

/// Applies one normalized envelope to the digital twin of its vehicle.
///
/// There is no cross-request locking: the stream keys envelopes by vehicle
/// id, so updates for one vehicle arrive in order on one partition. The
/// staleness guard is the backstop for redeliveries and for late events that
/// were produced out of order.
pub struct TwinUpdater {
    store: Arc<dyn TwinStore>,
    ttl: Duration,
}

impl TwinUpdater {
    pub fn new(store: Arc<dyn TwinStore>, ttl: Duration) -> TwinUpdater {
        TwinUpdater { store, ttl }
    }

    #[instrument(skip_all, fields(vehicle_id = %envelope.vehicle_id))]
    pub async fn update(
        &self,
        envelope: &CanonicalTelemetryEnvelope,
    ) -> Result<UpdateOutcome, StoreError> {
        if let Some(existing) = self.store.get(&envelope.vehicle_id).await? {
            // An equal timestamp means we already applied this reading
            if existing.last_seen >= envelope.event_timestamp {
                counter!("twin_updates_stale_total").increment(1);
                debug!(
                    "discarding stale envelope, event at {} vs twin seen at {}",
                    envelope.event_timestamp, existing.last_seen
                );
                return Ok(UpdateOutcome::Stale);
            }
        }

        let mut twin = DigitalTwinState {
            vehicle_id: envelope.vehicle_id.clone(),
            vendor: envelope.vendor.clone(),
            last_seen: envelope.ingestion_timestamp,
            online: true,
            telemetry: envelope.telemetry.clone().unwrap_or_default(),
            health_score: 0,
            health_state: fleet_common::twin::HealthState::Critical,
        };
        let health = evaluate(&twin);
        twin.health_score = health.score;
        twin.health_state = health.state;

        self.store.set_with_ttl(&twin, self.ttl).await?;
        counter!("twin_updates_applied_total").increment(1);
        Ok(UpdateOutcome::Applied)
    }
}

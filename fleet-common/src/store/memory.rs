use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use crate::store::{twin_key, StoreError, TwinStore};
use crate::time::TimeSource;
use crate::twin::DigitalTwinState;

/// In-process twin store with per-entry expiry, driven by an injected clock.
/// Used by tests (with a [`crate::time::FixedClock`]) and by local dev runs
/// that have no Redis around.
pub struct MemoryTwinStore {
    clock: Arc<dyn TimeSource>,
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    twin: DigitalTwinState,
    expires_at: OffsetDateTime,
}

impl MemoryTwinStore {
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        MemoryTwinStore {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl TwinStore for MemoryTwinStore {
    async fn get(&self, vehicle_id: &str) -> Result<Option<DigitalTwinState>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(&twin_key(vehicle_id)) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.twin.clone())),
            Some(_) => {
                // Passive eviction, like the real store
                entries.remove(&twin_key(vehicle_id));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        twin: &DigitalTwinState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = self.clock.now() + ttl;
        self.lock().insert(
            twin_key(&twin.vehicle_id),
            Entry {
                twin: twin.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<DigitalTwinState>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries.values().map(|entry| entry.twin.clone()).collect())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::TelemetrySnapshot;
    use crate::time::FixedClock;
    use crate::twin::HealthState;
    use time::macros::datetime;

    fn twin(vehicle_id: &str) -> DigitalTwinState {
        DigitalTwinState {
            vehicle_id: vehicle_id.to_string(),
            vendor: "UNKNOWN".to_string(),
            last_seen: datetime!(2026-01-25 18:32:45 UTC),
            online: true,
            telemetry: TelemetrySnapshot::default(),
            health_score: 100,
            health_state: HealthState::Healthy,
        }
    }

    #[tokio::test]
    async fn entries_expire_after_the_ttl() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-25 18:00:00 UTC)));
        let store = MemoryTwinStore::new(clock.clone());

        store
            .set_with_ttl(&twin("EV-001"), Duration::seconds(120))
            .await
            .unwrap();
        assert!(store.get("EV-001").await.unwrap().is_some());

        clock.advance(Duration::seconds(119));
        assert!(store.get("EV-001").await.unwrap().is_some());

        clock.advance(Duration::seconds(2));
        assert!(store.get("EV-001").await.unwrap().is_none());
        assert!(store.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_write_rearms_the_expiry() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-25 18:00:00 UTC)));
        let store = MemoryTwinStore::new(clock.clone());

        store
            .set_with_ttl(&twin("EV-001"), Duration::seconds(120))
            .await
            .unwrap();
        clock.advance(Duration::seconds(100));
        store
            .set_with_ttl(&twin("EV-001"), Duration::seconds(120))
            .await
            .unwrap();

        // 180s after the first write, 80s after the second: still live
        clock.advance(Duration::seconds(80));
        assert!(store.get("EV-001").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scan_sees_only_live_twins() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-25 18:00:00 UTC)));
        let store = MemoryTwinStore::new(clock.clone());

        store
            .set_with_ttl(&twin("EV-001"), Duration::seconds(60))
            .await
            .unwrap();
        store
            .set_with_ttl(&twin("EV-002"), Duration::seconds(300))
            .await
            .unwrap();

        clock.advance(Duration::seconds(120));
        let live = store.scan().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].vehicle_id, "EV-002");
    }
}

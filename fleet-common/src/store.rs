use async_trait::async_trait;
use thiserror::Error;
use time::Duration;

use crate::twin::DigitalTwinState;

pub mod memory;
pub mod redis;

pub use memory::MemoryTwinStore;
pub use redis::RedisTwinStore;

/// Key prefix for twin entries. One entry per vehicle.
pub const TWIN_KEY_PREFIX: &str = "digital_twin:";

pub fn twin_key(vehicle_id: &str) -> String {
    format!("{}{}", TWIN_KEY_PREFIX, vehicle_id)
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store command failed: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("stored twin could not be decoded: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store command timed out")]
    Timeout,
}

/// The expiring keyed state store holding the latest twin per vehicle.
///
/// The twin updater is the sole writer; the read-side endpoints only read.
/// Any backend satisfying get / set-with-ttl / prefix-scan / prefix-delete is
/// substitutable. Tests use [`MemoryTwinStore`] with a manual clock so TTL
/// and ordering can be exercised without a network dependency.
#[async_trait]
pub trait TwinStore: Send + Sync {
    async fn get(&self, vehicle_id: &str) -> Result<Option<DigitalTwinState>, StoreError>;

    /// Overwrites any prior entry and (re)arms the expiry. Every accepted
    /// update refreshes the TTL, not only the first write.
    async fn set_with_ttl(&self, twin: &DigitalTwinState, ttl: Duration)
        -> Result<(), StoreError>;

    /// All live twins, in no particular order. Read-side projections only.
    async fn scan(&self) -> Result<Vec<DigitalTwinState>, StoreError>;

    /// Drops every twin entry. Operational escape hatch and test cleanup.
    async fn delete_all(&self) -> Result<(), StoreError>;
}

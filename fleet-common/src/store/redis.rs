use std::time::Duration as StdDuration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::time::timeout;
use tracing::debug;

use crate::store::{twin_key, StoreError, TwinStore, TWIN_KEY_PREFIX};
use crate::twin::DigitalTwinState;

// Twin values are small JSON blobs; commands past this are broker trouble,
// not load.
const REDIS_TIMEOUT_MS: u64 = 200;

/// Redis-backed twin store. Values are JSON, expiry is native `SETEX`.
pub struct RedisTwinStore {
    client: redis::Client,
}

impl RedisTwinStore {
    pub fn new(addr: String) -> Result<RedisTwinStore, StoreError> {
        let client = redis::Client::open(addr).map_err(StoreError::Redis)?;
        Ok(RedisTwinStore { client })
    }

    async fn connection(&self) -> Result<redis::aio::Connection, StoreError> {
        let conn = timeout(
            StdDuration::from_millis(REDIS_TIMEOUT_MS),
            self.client.get_async_connection(),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(conn)
    }

    async fn twin_keys(conn: &mut redis::aio::Connection) -> Result<Vec<String>, StoreError> {
        let keys: Vec<String> = timeout(
            StdDuration::from_millis(REDIS_TIMEOUT_MS),
            conn.keys(format!("{}*", TWIN_KEY_PREFIX)),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(keys)
    }
}

#[async_trait]
impl TwinStore for RedisTwinStore {
    async fn get(&self, vehicle_id: &str) -> Result<Option<DigitalTwinState>, StoreError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = timeout(
            StdDuration::from_millis(REDIS_TIMEOUT_MS),
            conn.get(twin_key(vehicle_id)),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        twin: &DigitalTwinState,
        ttl: time::Duration,
    ) -> Result<(), StoreError> {
        let key = twin_key(&twin.vehicle_id);
        let value = serde_json::to_string(twin)?;

        let mut conn = self.connection().await?;
        timeout(
            StdDuration::from_millis(REDIS_TIMEOUT_MS),
            conn.set_ex::<_, _, ()>(&key, value, ttl.whole_seconds() as usize),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        debug!(key = %key, "stored twin");
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<DigitalTwinState>, StoreError> {
        let mut conn = self.connection().await?;
        let keys = Self::twin_keys(&mut conn).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<String>> = timeout(
            StdDuration::from_millis(REDIS_TIMEOUT_MS),
            redis::cmd("MGET").arg(&keys).query_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        // Entries can expire between KEYS and MGET, skip the holes
        let mut twins = Vec::with_capacity(values.len());
        for json in values.into_iter().flatten() {
            twins.push(serde_json::from_str(&json)?);
        }
        Ok(twins)
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let keys = Self::twin_keys(&mut conn).await?;
        if keys.is_empty() {
            return Ok(());
        }
        timeout(
            StdDuration::from_millis(REDIS_TIMEOUT_MS),
            conn.del::<_, ()>(&keys),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }
}

//! Redis session store
//!
//! Lockout markers and refresh-token records live in Redis with native key
//! expiry (`SET ... EX`), so nothing has to sweep them.

use async_trait::async_trait;
use std::time::Duration;

use crate::store::SessionStore;
use crate::{Result, WardenError};

/// Redis-backed session store
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    /// Open a client for `redis_url`. No connection is made until first use.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| WardenError::SessionStoreError(format!("Invalid Redis URL: {e}")))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| WardenError::SessionStoreError(format!("Redis connection failed: {e}")))
    }

    /// Test the connection with PING
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| WardenError::SessionStoreError(format!("Redis PING failed: {e}")))?;
        Ok(())
    }
}

/// Redis expiry is whole seconds; round up and never go below one
fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(expiry_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| WardenError::SessionStoreError(format!("Redis SET failed: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| WardenError::SessionStoreError(format!("Redis GET failed: {e}")))?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| WardenError::SessionStoreError(format!("Redis DEL failed: {e}")))?;
        Ok(())
    }
}

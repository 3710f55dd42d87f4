use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use strive_core::{LockError, LockManager};
use tracing::info;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, LockError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LockError::Backend(e.to_string()))
    }

    /// Sliding-window request counter; `true` while the caller is within
    /// the limit.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

#[async_trait]
impl LockManager for RedisClient {
    /// SET NX with an expiry: one attempt, no waiting on the holder. The
    /// lease means a dead holder frees the class after at most the lease
    /// duration.
    async fn acquire(&self, key: &str, lease: Duration) -> Result<bool, LockError> {
        let mut conn = self.connection().await?;
        let ttl_seconds = lease.as_secs().max(1);

        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("locked")
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        if result.is_some() {
            info!("Lock acquired: {} (lease {}s)", key, ttl_seconds);
        }
        Ok(result.is_some())
    }

    /// DEL is a no-op on missing keys, which makes release idempotent.
    async fn release(&self, key: &str) -> Result<(), LockError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .del(key)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        Ok(())
    }
}

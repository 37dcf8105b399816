use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::errors::AppError;
use crate::storage::KeyValueStore;

/// Redis-backed key-value store (tickets, device secrets, nonces, push tokens).
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(client: &redis::Client) -> anyhow::Result<Self> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        // SET NX replies OK when stored and nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }
}

//! Redis 고속 캐시 구현.
//!
//! 값은 `{data, stored_at}` JSON 봉투로 저장하여 조회 측에서
//! 저장 시각 기준 신선도를 판단할 수 있게 합니다.

use async_trait::async_trait;
use quote_core::{CacheEntry, CoreResult, FastCache, RedisConfig, StorageKey};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{DataError, Result};

/// Redis 연결 래퍼.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    /// 새로운 Redis cache 연결을 생성합니다.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        info!("Connecting to Redis...");

        let client = Client::open(config.url.as_str())?;
        let connection = client.get_multiplexed_async_connection().await?;

        info!("Redis connection established");

        Ok(Self { connection })
    }

    /// Redis 상태를 확인합니다.
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection.clone();
        let result: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(result == "PONG")
    }

    /// 캐시 봉투를 읽습니다.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 캐시 봉투를 TTL과 함께 저장합니다.
    pub async fn set_entry(&self, key: &str, entry: &CacheEntry, ttl_secs: u64) -> Result<()> {
        let json = serde_json::to_string(entry)?;

        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, json, ttl_secs.max(1)).await?;

        Ok(())
    }

    /// cache에서 키를 삭제합니다.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| DataError::CacheError(e.to_string()))?;

        Ok(deleted > 0)
    }
}

#[async_trait]
impl FastCache for RedisCache {
    async fn get(&self, key: &StorageKey) -> CoreResult<Option<CacheEntry>> {
        Ok(self.get_entry(&key.to_key_string()).await?)
    }

    #[instrument(skip(self, data), fields(key = %key))]
    async fn set(&self, key: &StorageKey, data: &Value, ttl_secs: u64) -> CoreResult<()> {
        self.set_entry(&key.to_key_string(), &CacheEntry::new(data.clone()), ttl_secs)
            .await?;
        debug!(ttl_secs, "Cache entry written");
        Ok(())
    }
}

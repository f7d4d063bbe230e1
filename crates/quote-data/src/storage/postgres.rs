//! PostgreSQL 영구 스냅샷 저장소.
//!
//! 고속 캐시가 비었을 때의 마지막 fallback 계층입니다.
//! 저장 키당 한 행만 유지하며 만료되지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quote_core::{
    CacheEntry, CoreResult, DatabaseConfig, PersistentStore, StorageClassification, StorageKey,
};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{DataError, Result};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS quote_snapshots (
    storage_key    TEXT PRIMARY KEY,
    symbol         TEXT NOT NULL,
    provider       TEXT NOT NULL,
    query_type     TEXT NOT NULL,
    market         TEXT NOT NULL,
    classification TEXT NOT NULL,
    payload        TEXT NOT NULL,
    stored_at      TIMESTAMPTZ NOT NULL
)
"#;

/// 스냅샷 레코드.
#[derive(Debug, Clone, FromRow)]
struct SnapshotRecord {
    payload: String,
    stored_at: DateTime<Utc>,
}

/// PostgreSQL 기반 스냅샷 저장소.
#[derive(Clone)]
pub struct SnapshotStore {
    pool: PgPool,
}

impl SnapshotStore {
    /// 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 기존 연결 풀에서 생성합니다.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 스냅샷 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        debug!("quote_snapshots schema ready");
        Ok(())
    }

    /// 데이터베이스 상태를 확인합니다.
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }

    /// 연결 풀을 닫습니다.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PersistentStore for SnapshotStore {
    async fn get(&self, key: &StorageKey) -> CoreResult<Option<CacheEntry>> {
        let record: Option<SnapshotRecord> = sqlx::query_as(
            "SELECT payload, stored_at FROM quote_snapshots WHERE storage_key = $1",
        )
        .bind(key.to_key_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DataError::from)?;

        match record {
            Some(r) => {
                let data: Value = serde_json::from_str(&r.payload).map_err(DataError::from)?;
                Ok(Some(CacheEntry::with_stored_at(data, r.stored_at)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, data), fields(key = %key))]
    async fn set(
        &self,
        key: &StorageKey,
        data: &Value,
        classification: StorageClassification,
    ) -> CoreResult<()> {
        let payload = serde_json::to_string(data).map_err(DataError::from)?;

        sqlx::query(
            r#"
            INSERT INTO quote_snapshots
                (storage_key, symbol, provider, query_type, market, classification, payload, stored_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (storage_key) DO UPDATE SET
                classification = EXCLUDED.classification,
                payload = EXCLUDED.payload,
                stored_at = EXCLUDED.stored_at
            "#,
        )
        .bind(key.to_key_string())
        .bind(&key.symbol)
        .bind(&key.provider)
        .bind(key.query_type.as_str())
        .bind(key.market.as_str())
        .bind(classification.as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(DataError::from)?;

        Ok(())
    }
}

//! 인메모리 캐시/저장소.
//!
//! Redis나 PostgreSQL을 사용할 수 없을 때의 대체 구현이며, 테스트에서도 사용합니다.
//! 고속 캐시로 쓰일 때는 TTL을 지키고, 영구 저장소로 쓰일 때는 만료가 없습니다.

use async_trait::async_trait;
use quote_core::{
    CacheEntry, CoreResult, FastCache, PersistentStore, StorageClassification, StorageKey,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: CacheEntry,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// 인메모리 키-값 저장소.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<StorageKey, StoredEntry>>,
    writes: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 만료되지 않은 항목을 조회합니다.
    pub async fn entry(&self, key: &StorageKey) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|stored| !stored.is_expired(Instant::now()))
            .map(|stored| stored.entry.clone())
    }

    /// 저장 시각을 지정하여 항목을 직접 넣습니다 (쓰기 횟수에 포함되지 않음).
    pub async fn seed(&self, key: StorageKey, entry: CacheEntry) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            StoredEntry {
                entry,
                expires_at: None,
            },
        );
    }

    /// `set` 호출 횟수.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// 만료되지 않은 항목 수.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn put(&self, key: &StorageKey, data: &Value, ttl: Option<Duration>) {
        let stored = StoredEntry {
            entry: CacheEntry::new(data.clone()),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };

        let mut entries = self.entries.write().await;
        entries.insert(key.clone(), stored);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl FastCache for MemoryCache {
    async fn get(&self, key: &StorageKey) -> CoreResult<Option<CacheEntry>> {
        Ok(self.entry(key).await)
    }

    async fn set(&self, key: &StorageKey, data: &Value, ttl_secs: u64) -> CoreResult<()> {
        self.put(key, data, Some(Duration::from_secs(ttl_secs))).await;
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for MemoryCache {
    async fn get(&self, key: &StorageKey) -> CoreResult<Option<CacheEntry>> {
        Ok(self.entry(key).await)
    }

    async fn set(
        &self,
        key: &StorageKey,
        data: &Value,
        _classification: StorageClassification,
    ) -> CoreResult<()> {
        self.put(key, data, None).await;
        Ok(())
    }
}

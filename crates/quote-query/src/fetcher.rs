//! 캐시 우선 조회기.
//!
//! 청크 단위로 다음 순서를 따릅니다:
//! 1. 고속 캐시 조회 (신선도 검사). 적중하면 바로 `CACHE`로 응답하고 백그라운드 갱신 예약
//! 2. 미스 심볼만 모아 업스트림 배치 조회
//! 3. 업스트림이 채우지 못한 심볼은 영구 저장소에서 fallback
//! 4. 업스트림에서 받은 데이터는 응답과 별개로 고속 캐시와 영구 저장소에 기록

use chrono::Utc;
use futures::future::join_all;
use quote_core::{
    storage_classification, FastCache, FetchRequest, ItemError, ItemErrorKind, Market,
    PersistentStore, QueryOptions, QueryType, StorageKey, SymbolResult, UpstreamFetcher,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::executor::{run_all, run_guarded, Outcome};
use crate::metrics;
use crate::refresh::{RefreshScheduler, RefreshTask};
use crate::ttl::TtlCalculator;

/// 한 시장 청크의 조회 문맥.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub correlation_id: String,
    pub query_type: QueryType,
    pub market: Market,
    /// 저장 키에 사용할 provider 태그
    pub provider_tag: String,
    pub provider_preference: Option<String>,
    pub options: QueryOptions,
}

impl FetchContext {
    pub fn storage_key(&self, symbol: &str) -> StorageKey {
        StorageKey::new(symbol, self.provider_tag.as_str(), self.query_type, self.market)
    }

    fn upstream_request(&self, symbols: Vec<String>) -> FetchRequest {
        FetchRequest::new(symbols, self.query_type.capability())
            .with_provider(self.provider_preference.clone())
            .with_options(self.options.clone())
    }
}

/// 청크 조회 결과.
#[derive(Debug, Clone, Default)]
pub struct ChunkResult {
    pub results: Vec<SymbolResult>,
    pub errors: Vec<ItemError>,
    /// 영구 저장소에서 채운 `REALTIME` 결과 수
    pub persistent_fallbacks: usize,
}

impl ChunkResult {
    pub fn merge(&mut self, other: ChunkResult) {
        self.results.extend(other.results);
        self.errors.extend(other.errors);
        self.persistent_fallbacks += other.persistent_fallbacks;
    }
}

/// 캐시 우선 조회기.
pub struct CacheFirstFetcher {
    fast_cache: Arc<dyn FastCache>,
    store: Arc<dyn PersistentStore>,
    upstream: Arc<dyn UpstreamFetcher>,
    ttl: TtlCalculator,
    scheduler: Option<RefreshScheduler>,
    cache_lookup_timeout: Duration,
}

impl CacheFirstFetcher {
    pub fn new(
        fast_cache: Arc<dyn FastCache>,
        store: Arc<dyn PersistentStore>,
        upstream: Arc<dyn UpstreamFetcher>,
        ttl: TtlCalculator,
        cache_lookup_timeout: Duration,
    ) -> Self {
        Self {
            fast_cache,
            store,
            upstream,
            ttl,
            scheduler: None,
            cache_lookup_timeout,
        }
    }

    /// 캐시 적중 시 사용할 갱신 스케줄러를 설정합니다.
    pub fn with_scheduler(mut self, scheduler: RefreshScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn scheduler(&self) -> Option<&RefreshScheduler> {
        self.scheduler.as_ref()
    }

    /// 단일 심볼 조회.
    pub async fn fetch(&self, symbol: &str, ctx: &FetchContext) -> Result<SymbolResult, ItemError> {
        let mut chunk = self.fetch_chunk(&[symbol.to_string()], ctx).await;
        match chunk.results.pop() {
            Some(result) => Ok(result),
            None => Err(chunk.errors.pop().unwrap_or_else(|| {
                ItemError::for_symbol(symbol, ctx.market, ItemErrorKind::NotFound, "데이터 없음")
            })),
        }
    }

    /// 한 시장에 속한 심볼 청크를 조회합니다.
    ///
    /// 실패는 심볼 단위 에러로 반환하며 이 함수 자체는 실패하지 않습니다.
    pub async fn fetch_chunk(&self, symbols: &[String], ctx: &FetchContext) -> ChunkResult {
        let mut chunk = ChunkResult::default();

        let misses = if ctx.options.use_cache {
            self.lookup_cache(symbols, ctx, &mut chunk).await
        } else {
            symbols.to_vec()
        };

        if misses.is_empty() {
            return chunk;
        }

        self.fetch_upstream(misses, ctx, &mut chunk).await;
        chunk
    }

    /// 고속 캐시를 조회하여 적중분은 결과에 넣고 미스 심볼을 반환합니다.
    async fn lookup_cache(
        &self,
        symbols: &[String],
        ctx: &FetchContext,
        chunk: &mut ChunkResult,
    ) -> Vec<String> {
        let keys: Vec<StorageKey> = symbols.iter().map(|s| ctx.storage_key(s)).collect();
        let ops: Vec<_> = keys.iter().map(|key| self.fast_cache.get(key)).collect();
        let outcomes = run_all(ops, Some(self.cache_lookup_timeout)).await;

        let now = Utc::now();
        let mut misses = Vec::new();

        for ((symbol, key), outcome) in symbols.iter().zip(keys).zip(outcomes) {
            match outcome.flatten() {
                Outcome::Success(Some(entry)) if entry.is_fresh(ctx.options.max_age_seconds, now) => {
                    metrics::record_cache_hit(ctx.market);
                    self.schedule_refresh(key, symbol, ctx, &entry.data);
                    chunk.results.push(SymbolResult::from_cache(
                        symbol.as_str(),
                        ctx.market,
                        entry.data,
                        entry.stored_at,
                    ));
                }
                Outcome::Success(_) => {
                    metrics::record_cache_miss(ctx.market);
                    misses.push(symbol.clone());
                }
                Outcome::Failure(reason) => {
                    warn!(symbol = %symbol, reason = %reason, "Cache lookup failed, treating as miss");
                    metrics::record_chunk_failure("cache_lookup", reason.label());
                    metrics::record_cache_miss(ctx.market);
                    misses.push(symbol.clone());
                }
            }
        }

        debug!(
            market = %ctx.market,
            chunk_size = symbols.len(),
            hits = symbols.len() - misses.len(),
            "Cache lookup done"
        );
        misses
    }

    fn schedule_refresh(&self, key: StorageKey, symbol: &str, ctx: &FetchContext, snapshot: &Value) {
        if let Some(scheduler) = &self.scheduler {
            let task = RefreshTask::new(
                key,
                ctx.upstream_request(vec![symbol.to_string()]),
                ctx.correlation_id.as_str(),
                Some(snapshot.clone()),
            );
            scheduler.schedule(task);
        }
    }

    /// 미스 심볼을 업스트림에서 조회하고, 빈 자리는 영구 저장소로 채웁니다.
    async fn fetch_upstream(&self, misses: Vec<String>, ctx: &FetchContext, chunk: &mut ChunkResult) {
        let request = ctx.upstream_request(misses.clone());
        let started = Instant::now();

        let response = match run_guarded(self.upstream.fetch(&request), None).await.flatten() {
            Outcome::Success(response) => response,
            Outcome::Failure(reason) => {
                warn!(
                    market = %ctx.market,
                    chunk_size = misses.len(),
                    reason = %reason,
                    "Upstream batch call failed"
                );
                metrics::record_chunk_failure("upstream", reason.label());
                chunk.errors.extend(misses.iter().map(|symbol| {
                    ItemError::for_symbol(symbol.as_str(), ctx.market, ItemErrorKind::FetchFailed, reason.to_string())
                }));
                return;
            }
        };

        metrics::record_upstream_duration(&response.provider_used, started.elapsed().as_secs_f64());

        let mut fresh = Vec::new();
        let mut gaps = Vec::new();
        for (index, symbol) in misses.iter().enumerate() {
            match response.get(index) {
                Some(payload) => {
                    chunk
                        .results
                        .push(SymbolResult::realtime(symbol.as_str(), ctx.market, payload.clone()));
                    fresh.push((ctx.storage_key(symbol), payload.clone()));
                }
                None => gaps.push((symbol, response.failure_reason(symbol).map(str::to_string))),
            }
        }

        debug!(
            provider_used = %response.provider_used,
            fetched = fresh.len(),
            gaps = gaps.len(),
            "Upstream batch done"
        );

        if !fresh.is_empty() {
            self.spawn_write_back(ctx, fresh);
        }

        if gaps.is_empty() {
            return;
        }

        let keys: Vec<StorageKey> = gaps.iter().map(|(symbol, _)| ctx.storage_key(symbol)).collect();
        let fallbacks = join_all(keys.iter().map(|key| self.store.get(key))).await;

        for ((symbol, reason), fallback) in gaps.into_iter().zip(fallbacks) {
            match fallback {
                Ok(Some(entry)) => {
                    info!(
                        symbol = %symbol,
                        market = %ctx.market,
                        stored_at = %entry.stored_at,
                        "Served from persistent store as REALTIME"
                    );
                    metrics::record_persistent_fallback(ctx.market);
                    chunk.persistent_fallbacks += 1;
                    chunk
                        .results
                        .push(SymbolResult::realtime(symbol.as_str(), ctx.market, entry.data));
                }
                Ok(None) => {
                    chunk.errors.push(ItemError::for_symbol(
                        symbol.as_str(),
                        ctx.market,
                        ItemErrorKind::NotFound,
                        reason.unwrap_or_else(|| "데이터 없음".to_string()),
                    ));
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Persistent store lookup failed");
                    let reason = match reason {
                        Some(upstream) => format!("{}; 영구 저장소 조회 실패: {}", upstream, e),
                        None => format!("영구 저장소 조회 실패: {}", e),
                    };
                    chunk.errors.push(ItemError::for_symbol(
                        symbol.as_str(),
                        ctx.market,
                        ItemErrorKind::NotFound,
                        reason,
                    ));
                }
            }
        }
    }

    /// 업스트림 결과를 두 저장 계층에 기록합니다. 응답 경로를 막지 않습니다.
    fn spawn_write_back(&self, ctx: &FetchContext, entries: Vec<(StorageKey, Value)>) {
        let fast_cache = Arc::clone(&self.fast_cache);
        let store = Arc::clone(&self.store);
        let ttl = self.ttl.clone();
        let market = ctx.market;
        let classification = storage_classification(ctx.query_type);
        let correlation_id = ctx.correlation_id.clone();

        tokio::spawn(async move {
            let ttl_secs = ttl.ttl_seconds(market).await;

            for (key, payload) in &entries {
                if let Err(e) = fast_cache.set(key, payload, ttl_secs).await {
                    warn!(key = %key, correlation_id = %correlation_id, error = %e, "Fast cache write-back failed");
                    metrics::record_write_back_failure("fast_cache");
                }
                if let Err(e) = store.set(key, payload, classification).await {
                    warn!(key = %key, correlation_id = %correlation_id, error = %e, "Persistent write-back failed");
                    metrics::record_write_back_failure("persistent");
                }
            }

            debug!(count = entries.len(), ttl_secs, %market, "Write-back complete");
        });
    }
}

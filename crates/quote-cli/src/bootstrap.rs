//! 협력자 구성.
//!
//! Redis나 PostgreSQL이 비활성이거나 연결할 수 없으면 경고를 남기고
//! 인메모리 계층으로 대체합니다.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use quote_core::{AppConfig, FastCache, MarketStatusProvider, PersistentStore, UpstreamFetcher};
use quote_data::{
    CompositeFetcher, MemoryCache, PriceChangeDetector, RedisCache, SnapshotStore,
    TradingHoursStatus, YahooQuoteFetcher,
};
use quote_query::{CacheFirstFetcher, QueryPipeline, RefreshScheduler, ShutdownSummary, TtlCalculator};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{CliError, Result};

/// 구성된 서비스.
pub struct Services {
    pub pipeline: QueryPipeline,
    snapshot_store: Option<SnapshotStore>,
}

impl Services {
    /// 백그라운드 갱신을 종료하고 연결을 닫습니다.
    pub async fn shutdown(&self) -> Option<ShutdownSummary> {
        let summary = self.pipeline.shutdown().await;
        if let Some(store) = &self.snapshot_store {
            store.close().await;
        }
        summary
    }
}

async fn fast_cache(config: &AppConfig) -> Arc<dyn FastCache> {
    if !config.redis.enabled {
        info!("Redis disabled, using in-memory fast cache");
        return Arc::new(MemoryCache::new());
    }

    match RedisCache::connect(&config.redis).await {
        Ok(cache) => match cache.health_check().await {
            Ok(true) => Arc::new(cache),
            Ok(false) | Err(_) => {
                warn!("Redis health check failed, using in-memory fast cache");
                Arc::new(MemoryCache::new())
            }
        },
        Err(e) => {
            warn!(error = %e, "Redis 연결 실패, 인메모리 캐시 사용");
            Arc::new(MemoryCache::new())
        }
    }
}

async fn persistent_store(config: &AppConfig) -> (Arc<dyn PersistentStore>, Option<SnapshotStore>) {
    let fallback: Arc<dyn PersistentStore> = Arc::new(MemoryCache::new());

    if !config.database.enabled {
        info!("Database disabled, using in-memory snapshot store");
        return (fallback, None);
    }

    let connected = match SnapshotStore::connect(&config.database).await {
        Ok(store) => store.ensure_schema().await.map(|_| store),
        Err(e) => Err(e),
    };

    match connected {
        Ok(store) => {
            let shared: Arc<dyn PersistentStore> = Arc::new(store.clone());
            (shared, Some(store))
        }
        Err(e) => {
            warn!(error = %e, "데이터베이스 연결 실패, 인메모리 저장소 사용");
            (fallback, None)
        }
    }
}

/// 설정에서 조회 파이프라인을 구성합니다.
pub async fn build(config: &AppConfig) -> Result<Services> {
    let fast_cache = fast_cache(config).await;
    let (store, snapshot_store) = persistent_store(config).await;

    let upstream: Arc<dyn UpstreamFetcher> =
        Arc::new(CompositeFetcher::new().with_provider(Arc::new(YahooQuoteFetcher::new()?)));

    let status: Arc<dyn MarketStatusProvider> =
        Arc::new(TradingHoursStatus::with_holidays(config.market.holidays.iter().copied()));
    let ttl = TtlCalculator::new(status, config.ttl.clone());

    let mut fetcher = CacheFirstFetcher::new(
        Arc::clone(&fast_cache),
        store,
        Arc::clone(&upstream),
        ttl.clone(),
        config.query.cache_lookup_timeout(),
    );

    if config.refresh.enabled {
        let scheduler = RefreshScheduler::new(
            config.refresh.clone(),
            upstream,
            fast_cache,
            Arc::new(PriceChangeDetector::new()),
            ttl,
        );
        fetcher = fetcher.with_scheduler(scheduler);
    } else {
        info!("Background refresh disabled");
    }

    info!(
        market_chunk_size = config.query.market_chunk_size,
        provider_chunk_size = config.query.provider_chunk_size,
        refresh = config.refresh.enabled,
        "Query pipeline ready"
    );

    Ok(Services {
        pipeline: QueryPipeline::new(config.query.clone(), fetcher),
        snapshot_store,
    })
}

/// Prometheus exporter를 HTTP 리스너와 함께 설치합니다.
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("quote_query_duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )
        .map_err(|e| CliError::Metrics(e.to_string()))?
        .install()
        .map_err(|e| CliError::Metrics(e.to_string()))?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

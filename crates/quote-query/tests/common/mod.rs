//! 통합 테스트 공용 도구.

#![allow(dead_code)]

use async_trait::async_trait;
use quote_core::{
    CoreError, CoreResult, FetchFailure, FetchRequest, FetchResponse, Market, MarketStatus,
    MarketStatusProvider, QueryConfig, QueryType, RefreshConfig, StorageKey, TtlConfig,
    UpstreamFetcher,
};
use quote_data::{MemoryCache, PriceChangeDetector};
use quote_query::{CacheFirstFetcher, QueryPipeline, RefreshScheduler, RefreshTask, TtlCalculator};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// 스크립트로 동작을 지정하는 업스트림 mock.
#[derive(Default)]
pub struct ScriptedUpstream {
    missing: HashSet<String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
    gate: Option<Arc<Semaphore>>,
    price: Mutex<f64>,
    calls: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self {
            price: Mutex::new(100.0),
            ..Default::default()
        }
    }

    /// 데이터를 돌려주지 않는 심볼.
    pub fn with_missing(mut self, symbols: &[&str]) -> Self {
        self.missing.extend(symbols.iter().map(|s| s.to_string()));
        self
    }

    /// 포함된 배치 호출 전체를 실패시키는 심볼.
    pub fn with_failing(mut self, symbols: &[&str]) -> Self {
        self.failing.extend(symbols.iter().map(|s| s.to_string()));
        self
    }

    /// 포함된 배치 호출을 panic시키는 심볼.
    pub fn with_panicking(mut self, symbols: &[&str]) -> Self {
        self.panicking.extend(symbols.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_delay(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    /// 세마포어 허가를 받아야 응답합니다.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_price(&self, price: f64) {
        *self.price.lock().unwrap() = price;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, request: &FetchRequest) -> CoreResult<FetchResponse> {
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| CoreError::Upstream(e.to_string()))?;
        }

        let delay = request
            .symbols
            .iter()
            .filter_map(|s| self.delays.get(s))
            .max()
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if request.symbols.iter().any(|s| self.panicking.contains(s)) {
            panic!("provider sdk bug");
        }

        if request.symbols.iter().any(|s| self.failing.contains(s)) {
            return Err(CoreError::Upstream("scripted batch failure".to_string()));
        }

        let price = *self.price.lock().unwrap();
        let mut response = FetchResponse::empty(request.symbols.len(), "scripted");
        for (i, symbol) in request.symbols.iter().enumerate() {
            if self.missing.contains(symbol) {
                response.failures.push(FetchFailure {
                    symbol: symbol.clone(),
                    reason: "unknown symbol".to_string(),
                });
            } else {
                response.data[i] = Some(quote(symbol, price));
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl UpstreamFetcher for ScriptedUpstream {
    async fn fetch(&self, request: &FetchRequest) -> CoreResult<FetchResponse> {
        self.calls.lock().unwrap().push(request.symbols.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.respond(request).await
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 고정된 시장 상태.
pub struct FixedStatus(pub MarketStatus);

#[async_trait]
impl MarketStatusProvider for FixedStatus {
    async fn status(&self, _market: Market) -> CoreResult<MarketStatus> {
        Ok(self.0)
    }
}

pub fn quote(symbol: &str, price: f64) -> Value {
    json!({"symbol": symbol, "lastPrice": price})
}

pub fn key(symbol: &str, market: Market) -> StorageKey {
    StorageKey::new(symbol, "auto", QueryType::GetStockQuote, market)
}

/// 갱신 작업을 직접 만듭니다.
pub fn refresh_task(symbol: &str, market: Market, snapshot: Option<Value>) -> RefreshTask {
    let request = FetchRequest::new(vec![symbol.to_string()], QueryType::GetStockQuote.capability());
    RefreshTask::new(key(symbol, market), request, "test-correlation", snapshot)
}

/// 고유한 미국 심볼 (AAA, AAB, ...).
pub fn us_symbol(index: usize) -> String {
    let letters = [index / 676 % 26, index / 26 % 26, index % 26];
    letters.iter().map(|&n| (b'A' + n as u8) as char).collect()
}

pub fn refresh_config(max_concurrent: usize) -> RefreshConfig {
    RefreshConfig {
        max_concurrent,
        jitter_seed: Some(42),
        ..Default::default()
    }
}

pub fn ttl_calculator() -> TtlCalculator {
    TtlCalculator::new(Arc::new(FixedStatus(MarketStatus::trading())), TtlConfig::default())
}

pub fn scheduler(
    config: RefreshConfig,
    upstream: Arc<ScriptedUpstream>,
    cache: Arc<MemoryCache>,
) -> RefreshScheduler {
    RefreshScheduler::new(
        config,
        upstream,
        cache,
        Arc::new(PriceChangeDetector::new()),
        ttl_calculator(),
    )
}

/// 인메모리 협력자로 구성한 파이프라인.
pub struct Harness {
    pub pipeline: QueryPipeline,
    pub cache: Arc<MemoryCache>,
    pub store: Arc<MemoryCache>,
    pub upstream: Arc<ScriptedUpstream>,
}

impl Harness {
    pub fn new(upstream: ScriptedUpstream, query: QueryConfig, refresh: Option<RefreshConfig>) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryCache::new());
        let upstream = Arc::new(upstream);

        let mut fetcher = CacheFirstFetcher::new(
            cache.clone(),
            store.clone(),
            upstream.clone(),
            ttl_calculator(),
            query.cache_lookup_timeout(),
        );
        if let Some(config) = refresh {
            fetcher = fetcher.with_scheduler(scheduler(config, upstream.clone(), cache.clone()));
        }

        Self {
            pipeline: QueryPipeline::new(query, fetcher),
            cache,
            store,
            upstream,
        }
    }

    /// 갱신 비활성, 기본 조회 설정.
    pub fn simple(upstream: ScriptedUpstream) -> Self {
        Self::new(upstream, QueryConfig::default(), None)
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        self.pipeline
            .scheduler()
            .expect("refresh scheduler not configured")
    }
}

/// 조건이 참이 될 때까지 기다립니다.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

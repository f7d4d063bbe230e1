//! 조회 파이프라인.
//!
//! 요청 하나를 다음 순서로 처리합니다:
//! 1. 조회 유형 검증 (지원하지 않으면 즉시 `QueryError`)
//! 2. 심볼 정규화 (null/빈 항목은 개별 에러, 중복 제거)
//! 3. 시장별 분할 → 시장 청크 팬아웃 (시장 타임아웃)
//! 4. 시장 청크 안에서 provider 청크 팬아웃 (provider 타임아웃) → 캐시 우선 조회
//! 5. 결과/에러 병합, 페이지네이션

use quote_core::{
    paginate, query_span, ItemError, ItemErrorKind, Market, QueryConfig, QueryMetadata,
    QueryRequest, QueryResponse, QueryType, SourceTag,
};
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use tracing::{field, info, instrument, warn, Instrument, Span};
use uuid::Uuid;

use crate::chunker::{chunk, shard_by_market};
use crate::error::{QueryError, Result};
use crate::executor::{run_all, FailureReason, Outcome};
use crate::fetcher::{CacheFirstFetcher, ChunkResult, FetchContext};
use crate::metrics;
use crate::refresh::{RefreshScheduler, ShutdownSummary};

/// 조회 파이프라인.
pub struct QueryPipeline {
    config: QueryConfig,
    fetcher: CacheFirstFetcher,
}

impl QueryPipeline {
    pub fn new(config: QueryConfig, fetcher: CacheFirstFetcher) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// 백그라운드 갱신 스케줄러 (비활성이면 None).
    pub fn scheduler(&self) -> Option<&RefreshScheduler> {
        self.fetcher.scheduler()
    }

    /// 백그라운드 갱신을 종료합니다.
    pub async fn shutdown(&self) -> Option<ShutdownSummary> {
        match self.fetcher.scheduler() {
            Some(scheduler) => Some(scheduler.shutdown().await),
            None => None,
        }
    }

    /// 조회 요청을 실행합니다.
    ///
    /// 구조적으로 잘못된 요청만 `Err`를 반환합니다. 심볼 단위 실패는
    /// 응답의 `errors`에 담기며, 결과 0건인 응답도 정상 응답입니다.
    #[instrument(
        skip(self, request),
        fields(query_type = %request.query_type, symbols = request.symbols.len(), correlation_id = field::Empty)
    )]
    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();

        let query_type: QueryType = request
            .query_type
            .parse()
            .map_err(|_| QueryError::UnsupportedQueryType(request.query_type.clone()))?;

        if request.page == Some(0) {
            return Err(QueryError::InvalidRequest("page는 1 이상이어야 합니다".to_string()));
        }
        if request.limit == Some(0) {
            return Err(QueryError::InvalidRequest("limit는 1 이상이어야 합니다".to_string()));
        }

        let correlation_id = Uuid::new_v4().to_string();
        Span::current().record("correlation_id", correlation_id.as_str());
        metrics::record_query(query_type);

        let (symbols, malformed) = normalize_symbols(&request.symbols);
        let order: HashMap<&str, usize> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let provider_tag = request
            .provider
            .clone()
            .unwrap_or_else(|| self.config.default_provider.clone());

        let mut market_chunks: Vec<(Market, Vec<String>)> = Vec::new();
        for (market, members) in shard_by_market(&symbols, request.market) {
            for part in chunk(&members, self.config.market_chunk_size) {
                market_chunks.push((market, part));
            }
        }

        let ops: Vec<_> = market_chunks
            .iter()
            .map(|(market, part)| {
                let ctx = FetchContext {
                    correlation_id: correlation_id.clone(),
                    query_type,
                    market: *market,
                    provider_tag: provider_tag.clone(),
                    provider_preference: request.provider.clone(),
                    options: request.options.clone(),
                };
                let span = query_span!("market_chunk", ctx.correlation_id, ctx.market);
                async move { self.run_market_chunk(part, &ctx).await }.instrument(span)
            })
            .collect();

        let outcomes = run_all(ops, Some(self.config.market_timeout())).await;

        let mut merged = ChunkResult::default();
        for ((market, part), outcome) in market_chunks.iter().zip(outcomes) {
            match outcome {
                Outcome::Success(result) => merged.merge(result),
                Outcome::Failure(reason) => {
                    warn!(%market, chunk_size = part.len(), reason = %reason, "Market chunk failed");
                    metrics::record_chunk_failure("market", reason.label());
                    merged.errors.extend(stage_errors(part, *market, &reason));
                }
            }
        }

        let ChunkResult {
            mut results,
            errors: mut symbol_errors,
            persistent_fallbacks,
        } = merged;

        let position = |symbol: &str| order.get(symbol).copied().unwrap_or(usize::MAX);
        results.sort_by_key(|r| position(r.symbol.as_str()));
        symbol_errors.sort_by_key(|e| e.symbol.as_deref().map(position).unwrap_or(usize::MAX));

        let mut errors = malformed;
        errors.extend(symbol_errors);

        let cache_hits = results.iter().filter(|r| r.source == SourceTag::Cache).count();
        let realtime = results.len() - cache_hits;
        let elapsed = started.elapsed();

        for kind in [
            ItemErrorKind::MalformedItem,
            ItemErrorKind::FetchFailed,
            ItemErrorKind::Timeout,
            ItemErrorKind::NotFound,
        ] {
            let count = errors.iter().filter(|e| e.kind == kind).count();
            if count > 0 {
                metrics::record_item_errors(&kind.to_string(), count);
            }
        }
        metrics::record_query_duration(query_type, elapsed.as_secs_f64());

        let metadata = QueryMetadata {
            correlation_id,
            query_type: query_type.as_str().to_string(),
            requested: request.symbols.len(),
            valid: symbols.len(),
            cache_hits,
            realtime,
            failed: errors.len(),
            elapsed_ms: elapsed.as_millis() as u64,
        };

        info!(
            requested = metadata.requested,
            valid = metadata.valid,
            cache_hits,
            realtime,
            persistent_fallbacks,
            failed = metadata.failed,
            elapsed_ms = metadata.elapsed_ms,
            "Query completed"
        );

        let (results, pagination) = paginate(results, request.page, request.limit);

        Ok(QueryResponse {
            results,
            errors,
            pagination,
            metadata,
        })
    }

    /// 시장 청크를 provider 호출 단위로 나누어 동시에 조회합니다.
    async fn run_market_chunk(&self, symbols: &[String], ctx: &FetchContext) -> ChunkResult {
        let provider_chunks = chunk(symbols, self.config.provider_chunk_size);
        let ops: Vec<_> = provider_chunks
            .iter()
            .map(|part| self.fetcher.fetch_chunk(part, ctx))
            .collect();

        let outcomes = run_all(ops, Some(self.config.provider_timeout())).await;

        let mut merged = ChunkResult::default();
        for (part, outcome) in provider_chunks.iter().zip(outcomes) {
            match outcome {
                Outcome::Success(result) => merged.merge(result),
                Outcome::Failure(reason) => {
                    warn!(chunk_size = part.len(), reason = %reason, "Provider chunk failed");
                    metrics::record_chunk_failure("provider", reason.label());
                    merged.errors.extend(stage_errors(part, ctx.market, &reason));
                }
            }
        }
        merged
    }
}

/// 실패한 단계에 속한 모든 심볼의 에러.
fn stage_errors(symbols: &[String], market: Market, reason: &FailureReason) -> Vec<ItemError> {
    let kind = if reason.is_timeout() {
        ItemErrorKind::Timeout
    } else {
        ItemErrorKind::FetchFailed
    };

    symbols
        .iter()
        .map(|symbol| ItemError::for_symbol(symbol.as_str(), market, kind, reason.to_string()))
        .collect()
}

/// 심볼 목록을 정규화합니다.
///
/// 앞뒤 공백을 제거하고 대문자로 바꾸며, 중복은 처음 것만 남깁니다.
/// null이거나 빈 항목은 `MalformedItem` 에러가 됩니다.
pub fn normalize_symbols(raw: &[Option<String>]) -> (Vec<String>, Vec<ItemError>) {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    let mut errors = Vec::new();

    for (index, entry) in raw.iter().enumerate() {
        match entry.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => {
                let symbol = s.to_uppercase();
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol);
                }
            }
            _ => errors.push(ItemError::new(
                None,
                None,
                ItemErrorKind::MalformedItem,
                format!("symbols[{}]: null이거나 빈 심볼", index),
            )),
        }
    }

    (symbols, errors)
}

//! 조회 파이프라인 메트릭 헬퍼.
//!
//! `metrics` facade를 사용하므로 레코더가 설치되지 않았으면 아무 동작도 하지 않습니다.

use metrics::{counter, gauge, histogram};
use quote_core::{Market, QueryType};

/// 조회 요청 카운터 증가.
pub fn record_query(query_type: QueryType) {
    counter!("quote_queries_total", "query_type" => query_type.as_str()).increment(1);
}

/// 조회 지속 시간 기록.
pub fn record_query_duration(query_type: QueryType, duration_secs: f64) {
    histogram!("quote_query_duration_seconds", "query_type" => query_type.as_str())
        .record(duration_secs);
}

/// 개별 항목 에러 카운터 증가.
pub fn record_item_errors(kind: &str, count: usize) {
    counter!("quote_item_errors_total", "kind" => kind.to_string()).increment(count as u64);
}

// ============================================================================
// 캐시 메트릭
// ============================================================================

pub fn record_cache_hit(market: Market) {
    counter!("quote_cache_hits_total", "market" => market.as_str()).increment(1);
}

pub fn record_cache_miss(market: Market) {
    counter!("quote_cache_misses_total", "market" => market.as_str()).increment(1);
}

/// 영구 저장소 fallback으로 응답한 건수.
pub fn record_persistent_fallback(market: Market) {
    counter!("quote_persistent_fallback_total", "market" => market.as_str()).increment(1);
}

/// 캐시 write-back 실패.
pub fn record_write_back_failure(tier: &'static str) {
    counter!("quote_write_back_failures_total", "tier" => tier).increment(1);
}

// ============================================================================
// 팬아웃 메트릭
// ============================================================================

/// 팬아웃 단계 실패.
///
/// stage: market, provider, cache_lookup, upstream / reason: `FailureReason::label`
pub fn record_chunk_failure(stage: &'static str, reason: &'static str) {
    counter!(
        "quote_chunk_failures_total",
        "stage" => stage,
        "reason" => reason
    )
    .increment(1);
}

/// 업스트림 호출 지속 시간 기록.
pub fn record_upstream_duration(provider: &str, duration_secs: f64) {
    histogram!("quote_upstream_duration_seconds", "provider" => provider.to_string())
        .record(duration_secs);
}

// ============================================================================
// 백그라운드 갱신 메트릭
// ============================================================================

/// 갱신 스케줄/실행 결과 (started, queued, throttled, deduplicated, rejected, completed, failed, written).
pub fn record_refresh(outcome: &'static str) {
    counter!("quote_refresh_total", "outcome" => outcome).increment(1);
}

/// 실행 중/대기 중 갱신 수 설정.
pub fn set_refresh_load(running: usize, pending: usize) {
    gauge!("quote_refresh_running").set(running as f64);
    gauge!("quote_refresh_pending").set(pending as f64);
}

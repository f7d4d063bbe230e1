//! 조회 통계 구조체.

use quote_core::QueryResponse;
use quote_query::RefreshStatsSnapshot;
use serde::Serialize;
use std::time::Duration;

/// 반복 조회 누적 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryStats {
    /// 조회 횟수
    pub rounds: usize,
    /// 성공 결과 수
    pub results: usize,
    pub cache_hits: usize,
    pub realtime: usize,
    /// 개별 항목 에러 수
    pub errors: usize,
    /// 누적 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 응답 하나를 누적합니다.
    pub fn record(&mut self, response: &QueryResponse) {
        self.rounds += 1;
        self.results += response.metadata.cache_hits + response.metadata.realtime;
        self.cache_hits += response.metadata.cache_hits;
        self.realtime += response.metadata.realtime;
        self.errors += response.metadata.failed;
        self.elapsed += Duration::from_millis(response.metadata.elapsed_ms);
    }

    /// 캐시 적중률 (%)
    pub fn cache_hit_rate(&self) -> f64 {
        if self.results == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / self.results as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str, refresh: Option<RefreshStatsSnapshot>) {
        tracing::info!(
            operation = operation,
            rounds = self.rounds,
            results = self.results,
            cache_hits = self.cache_hits,
            realtime = self.realtime,
            errors = self.errors,
            cache_hit_rate = format!("{:.1}%", self.cache_hit_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "조회 통계"
        );

        if let Some(refresh) = refresh {
            tracing::info!(
                started = refresh.started,
                queued = refresh.queued,
                throttled = refresh.throttled,
                deduplicated = refresh.deduplicated,
                completed = refresh.completed,
                failed = refresh.failed,
                written = refresh.written,
                "백그라운드 갱신 통계"
            );
        }
    }
}

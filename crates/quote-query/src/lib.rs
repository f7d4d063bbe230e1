//! # Quote Query
//!
//! 배치 시세 조회 오케스트레이터.
//!
//! # 구성 요소
//!
//! - [`chunker`]: 시장별 분할과 크기 제한 청크
//! - [`executor`]: 타임아웃/panic을 작업 단위 실패로 바꾸는 팬아웃 실행기
//! - [`fetcher`]: 캐시 우선 조회와 영구 저장소 fallback
//! - [`ttl`]: 시장 상태 기반 캐시 TTL
//! - [`refresh`]: 백그라운드 캐시 갱신 스케줄러
//! - [`pipeline`]: 요청 단위 조합

pub mod chunker;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod metrics;
pub mod pipeline;
pub mod refresh;
pub mod ttl;

pub use chunker::{chunk, shard_by_market};
pub use error::{QueryError, Result};
pub use executor::{run_all, run_guarded, FailureReason, Outcome};
pub use fetcher::{CacheFirstFetcher, ChunkResult, FetchContext};
pub use pipeline::{normalize_symbols, QueryPipeline};
pub use refresh::{
    RefreshScheduler, RefreshStatsSnapshot, RefreshTask, ScheduleDecision, ShutdownSummary,
};
pub use ttl::TtlCalculator;

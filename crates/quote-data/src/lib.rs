//! 시세 조회 협력자 구현.
//!
//! 이 crate는 다음을 제공합니다:
//! - Redis 고속 캐시와 PostgreSQL 스냅샷 저장소
//! - 저장소가 없을 때 사용하는 인메모리 캐시/저장소
//! - Yahoo Finance 업스트림 provider와 복합 provider
//! - 거래 시간 기반 시장 상태와 가격 변경 감지기

pub mod change_detector;
pub mod error;
pub mod market_status;
pub mod provider;
pub mod storage;

pub use change_detector::PriceChangeDetector;
pub use error::{DataError, Result};
pub use market_status::TradingHoursStatus;
pub use provider::{CompositeFetcher, YahooQuoteFetcher};
pub use storage::{MemoryCache, RedisCache, SnapshotStore};

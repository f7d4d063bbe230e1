//! 시장 상태 기반 캐시 TTL 계산.

use quote_core::{CoreResult, Market, MarketStatus, MarketStatusProvider, TtlConfig};
use std::sync::Arc;
use tracing::warn;

/// 캐시 TTL 계산기.
///
/// 시장 상태 조회가 실패해도 오류를 내지 않고 기본 TTL을 돌려줍니다.
#[derive(Clone)]
pub struct TtlCalculator {
    status: Arc<dyn MarketStatusProvider>,
    config: TtlConfig,
}

impl TtlCalculator {
    pub fn new(status: Arc<dyn MarketStatusProvider>, config: TtlConfig) -> Self {
        Self { status, config }
    }

    /// 시장의 현재 상태에 맞는 TTL(초).
    pub async fn ttl_seconds(&self, market: Market) -> u64 {
        match self.status.status(market).await {
            Ok(status) => self.ttl_for_status(&status),
            Err(e) => {
                warn!(%market, error = %e, "시장 상태 조회 실패, 기본 TTL 사용");
                self.config.default_secs
            }
        }
    }

    /// 시장 상태에 대응하는 TTL(초).
    pub fn ttl_for_status(&self, status: &MarketStatus) -> u64 {
        if status.is_trading {
            self.config.trading_secs
        } else if status.is_holiday {
            self.config.holiday_secs
        } else {
            self.config.closed_secs
        }
    }

    /// 상태 계산 실패 시 TTL.
    pub fn default_ttl(&self) -> u64 {
        self.config.default_secs
    }

    /// 시장 상태 조회.
    pub async fn market_status(&self, market: Market) -> CoreResult<MarketStatus> {
        self.status.status(market).await
    }
}

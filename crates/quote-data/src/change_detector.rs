//! 가격 임계값 기반 변경 감지.
//!
//! 새 시세와 이전 스냅샷의 `lastPrice` 상대 변화율을 비교합니다.
//! 거래 중에는 작은 변화도 반영하고, 장 마감/휴장 중에는 더 큰 변화만 반영합니다.

use async_trait::async_trait;
use quote_core::{ChangeDetector, ChangeReport, CoreResult, Market, MarketStatus};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

/// 가격 필드 이름.
const PRICE_FIELD: &str = "lastPrice";

/// 가격 변화 감지기.
#[derive(Debug, Clone)]
pub struct PriceChangeDetector {
    /// 거래 중 임계값 (%)
    trading_threshold_pct: Decimal,
    /// 장 마감/휴장 중 임계값 (%)
    closed_threshold_pct: Decimal,
}

impl Default for PriceChangeDetector {
    fn default() -> Self {
        Self {
            trading_threshold_pct: Decimal::new(1, 2), // 0.01%
            closed_threshold_pct: Decimal::new(5, 1),  // 0.5%
        }
    }
}

impl PriceChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 임계값(%)을 지정하여 생성합니다.
    pub fn with_thresholds(trading_threshold_pct: Decimal, closed_threshold_pct: Decimal) -> Self {
        Self {
            trading_threshold_pct,
            closed_threshold_pct,
        }
    }

    fn threshold(&self, status: &MarketStatus) -> Decimal {
        if status.is_trading {
            self.trading_threshold_pct
        } else {
            self.closed_threshold_pct
        }
    }
}

/// payload에서 가격을 읽습니다. 숫자와 숫자 문자열을 모두 허용합니다.
fn extract_price(payload: &Value) -> Option<Decimal> {
    match payload.get(PRICE_FIELD)? {
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl ChangeDetector for PriceChangeDetector {
    async fn detect(
        &self,
        symbol: &str,
        new_payload: &Value,
        previous: Option<&Value>,
        market: Market,
        status: &MarketStatus,
    ) -> CoreResult<ChangeReport> {
        let Some(previous) = previous else {
            return Ok(ChangeReport::changed("이전 스냅샷 없음", 1.0));
        };

        let report = match (extract_price(new_payload), extract_price(previous)) {
            (Some(new_price), Some(old_price)) => {
                let threshold = self.threshold(status);
                if old_price.is_zero() {
                    if new_price.is_zero() {
                        ChangeReport::unchanged("가격 변화 없음")
                    } else {
                        ChangeReport::changed("이전 가격 0", 1.0)
                    }
                } else {
                    let change_pct =
                        ((new_price - old_price) / old_price * Decimal::ONE_HUNDRED).abs();
                    let details = format!(
                        "{} -> {} ({}%, 임계값 {}%)",
                        old_price,
                        new_price,
                        change_pct.round_dp(4),
                        threshold
                    );
                    if change_pct >= threshold {
                        let confidence = if threshold.is_zero() {
                            1.0
                        } else {
                            (change_pct / threshold).to_f64().unwrap_or(1.0).min(1.0)
                        };
                        ChangeReport::changed(details, confidence)
                    } else {
                        ChangeReport::unchanged(details)
                    }
                }
            }
            // 가격 필드가 없으면 payload 전체 비교
            _ => {
                if new_payload == previous {
                    ChangeReport::unchanged("payload 동일")
                } else {
                    ChangeReport::changed("payload 변경", 0.5)
                }
            }
        };

        debug!(symbol, %market, changed = report.changed, details = %report.details, "변경 감지");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_no_previous_is_changed() {
        let detector = PriceChangeDetector::new();
        let report = detector
            .detect("AAPL", &json!({"lastPrice": 190.0}), None, Market::Us, &MarketStatus::trading())
            .await
            .unwrap();
        assert!(report.changed);
        assert_eq!(report.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_threshold_depends_on_market_status() {
        let detector = PriceChangeDetector::with_thresholds(dec!(0.1), dec!(1));
        let old = json!({"lastPrice": 100.0});
        let new = json!({"lastPrice": 100.5});

        let trading = detector
            .detect("AAPL", &new, Some(&old), Market::Us, &MarketStatus::trading())
            .await
            .unwrap();
        assert!(trading.changed);

        let closed = detector
            .detect("AAPL", &new, Some(&old), Market::Us, &MarketStatus::closed())
            .await
            .unwrap();
        assert!(!closed.changed);
    }

    #[tokio::test]
    async fn test_string_price_and_payload_fallback() {
        let detector = PriceChangeDetector::new();

        let report = detector
            .detect(
                "700.HK",
                &json!({"lastPrice": "320.4"}),
                Some(&json!({"lastPrice": "320.4"})),
                Market::Hk,
                &MarketStatus::trading(),
            )
            .await
            .unwrap();
        assert!(!report.changed);

        let report = detector
            .detect(
                "600519",
                &json!({"name": "Kweichow Moutai", "industry": "Beverages"}),
                Some(&json!({"name": "Kweichow Moutai"})),
                Market::Sh,
                &MarketStatus::holiday(),
            )
            .await
            .unwrap();
        assert!(report.changed);
    }
}

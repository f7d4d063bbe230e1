//! Yahoo Finance 업스트림 provider.
//!
//! 심볼별로 최근 5일 일봉을 조회하여 최신 캔들과 전일 종가로 시세 payload를 만듭니다.
//! 배치 요청은 동시 요청 수를 제한하여 심볼 단위로 나누어 호출합니다.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use quote_core::{
    classify, CoreResult, FetchFailure, FetchRequest, FetchResponse, Market, QueryType,
    UpstreamFetcher,
};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

use crate::error::{DataError, Result};

/// provider 이름.
pub const YAHOO_PROVIDER: &str = "yahoo";

/// 기본 동시 요청 수.
const DEFAULT_CONCURRENCY: usize = 8;

/// Yahoo Finance 시세 조회기.
pub struct YahooQuoteFetcher {
    connector: yahoo::YahooConnector,
    concurrency: usize,
}

impl YahooQuoteFetcher {
    /// 새로운 YahooQuoteFetcher 생성.
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("{}", e)))?;

        Ok(Self {
            connector,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// 동시 요청 수를 설정합니다.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 단일 심볼 시세 조회.
    async fn fetch_quote(&self, symbol: &str) -> Result<Value> {
        let yahoo_symbol = to_yahoo_symbol(symbol);

        let response = self
            .connector
            .get_quote_range(&yahoo_symbol, "1d", "5d")
            .await
            .map_err(|e| DataError::FetchError(format!("{}: {}", yahoo_symbol, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("{}: {}", yahoo_symbol, e)))?;

        let Some(latest) = quotes.last() else {
            return Err(DataError::FetchError(format!("{}: 데이터 없음", yahoo_symbol)));
        };
        let previous_close = quotes
            .len()
            .checked_sub(2)
            .and_then(|i| quotes.get(i))
            .map(|q| q.close);

        debug!(symbol, candles = quotes.len(), "Yahoo 캔들 수신");

        Ok(quote_payload(
            symbol,
            latest.close,
            latest.open,
            latest.high,
            latest.low,
            latest.volume as f64,
            previous_close,
        ))
    }
}

#[async_trait]
impl UpstreamFetcher for YahooQuoteFetcher {
    #[instrument(skip(self, request), fields(symbols = request.symbols.len(), capability = %request.capability))]
    async fn fetch(&self, request: &FetchRequest) -> CoreResult<FetchResponse> {
        let mut response = FetchResponse::empty(request.symbols.len(), YAHOO_PROVIDER);

        if !supports_capability(&request.capability) {
            response.failures = request
                .symbols
                .iter()
                .map(|symbol| FetchFailure {
                    symbol: symbol.clone(),
                    reason: format!("{} 미지원 capability: {}", YAHOO_PROVIDER, request.capability),
                })
                .collect();
            return Ok(response);
        }

        let results: Vec<(usize, Result<Value>)> = stream::iter(request.symbols.iter().cloned().enumerate())
            .map(|(index, symbol)| async move { (index, self.fetch_quote(&symbol).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (index, result) in results {
            match result {
                Ok(payload) => response.data[index] = Some(payload),
                Err(e) => {
                    let symbol = request.symbols[index].clone();
                    warn!(symbol = %symbol, error = %e, "Yahoo 시세 조회 실패");
                    response.failures.push(FetchFailure {
                        symbol,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(response)
    }

    fn name(&self) -> &str {
        YAHOO_PROVIDER
    }
}

/// 시세 계열 capability만 지원합니다.
fn supports_capability(capability: &str) -> bool {
    capability == QueryType::GetStockQuote.capability()
        || capability == QueryType::GetIndexQuote.capability()
}

/// 내부 심볼을 Yahoo 심볼로 변환합니다.
///
/// - HK: `700.HK` → `0700.HK`, `00700` → `0700.HK`
/// - SZ: `000001` → `000001.SZ`
/// - SH: `600519.SH` → `600519.SS`
/// - US: 변환 없음
pub fn to_yahoo_symbol(symbol: &str) -> String {
    let code = symbol.split('.').next().unwrap_or(symbol);

    match classify(symbol) {
        Market::Hk => {
            let trimmed = code.trim_start_matches('0');
            format!("{:0>4}.HK", if trimmed.is_empty() { "0" } else { trimmed })
        }
        Market::Sz => format!("{}.SZ", code),
        Market::Sh => format!("{}.SS", code),
        Market::Us => symbol.to_string(),
    }
}

fn quote_payload(
    symbol: &str,
    last_price: f64,
    open: f64,
    high: f64,
    low: f64,
    volume: f64,
    previous_close: Option<f64>,
) -> Value {
    let change_percent = previous_close
        .filter(|prev| *prev != 0.0)
        .map(|prev| (last_price - prev) / prev * 100.0);

    json!({
        "symbol": symbol,
        "lastPrice": last_price,
        "open": open,
        "high": high,
        "low": low,
        "volume": volume,
        "previousClose": previous_close,
        "changePercent": change_percent,
        "provider": YAHOO_PROVIDER,
    })
}

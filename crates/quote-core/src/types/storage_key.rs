//! 저장 키 정의.
//!
//! 캐시, 영구 저장소, 중복 제거, 갱신 주기 제한이 모두 같은 키로 주소를 지정합니다.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Market, QueryType};

/// 캐시 가능한 단위 하나를 식별하는 복합 키 (symbol ⊕ provider ⊕ query type ⊕ market).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey {
    pub symbol: String,
    pub provider: String,
    pub query_type: QueryType,
    pub market: Market,
}

impl StorageKey {
    /// 새 저장 키를 생성합니다.
    pub fn new(
        symbol: impl Into<String>,
        provider: impl Into<String>,
        query_type: QueryType,
        market: Market,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            provider: provider.into(),
            query_type,
            market,
        }
    }

    /// 저장소에서 사용하는 문자열 키.
    pub fn to_key_string(&self) -> String {
        format!(
            "quote:{}:{}:{}:{}",
            self.provider, self.query_type, self.market, self.symbol
        )
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_string() {
        let key = StorageKey::new("700.HK", "yahoo", QueryType::GetStockQuote, Market::Hk);
        assert_eq!(key.to_string(), "quote:yahoo:get-stock-quote:HK:700.HK");
    }

    #[test]
    fn test_storage_key_identity() {
        let a = StorageKey::new("AAPL", "yahoo", QueryType::GetStockQuote, Market::Us);
        let b = StorageKey::new("AAPL", "yahoo", QueryType::GetStockBasicInfo, Market::Us);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_storage_keys_sort_by_symbol_then_query_type() {
        let mut keys = vec![
            StorageKey::new("MSFT", "yahoo", QueryType::GetStockQuote, Market::Us),
            StorageKey::new("AAPL", "yahoo", QueryType::GetIndexQuote, Market::Us),
            StorageKey::new("AAPL", "yahoo", QueryType::GetStockQuote, Market::Us),
        ];
        keys.sort();

        let order: Vec<(&str, QueryType)> =
            keys.iter().map(|k| (k.symbol.as_str(), k.query_type)).collect();
        assert_eq!(
            order,
            vec![
                ("AAPL", QueryType::GetStockQuote),
                ("AAPL", QueryType::GetIndexQuote),
                ("MSFT", QueryType::GetStockQuote),
            ]
        );
    }
}

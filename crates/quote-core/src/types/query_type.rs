//! 조회 유형 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 심볼 기반 조회 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryType {
    /// 실시간 시세
    GetStockQuote,
    /// 종목 기본 정보
    GetStockBasicInfo,
    /// 지수 시세
    GetIndexQuote,
}

impl QueryType {
    /// 지원하는 모든 조회 유형.
    pub fn all() -> [QueryType; 3] {
        [
            QueryType::GetStockQuote,
            QueryType::GetStockBasicInfo,
            QueryType::GetIndexQuote,
        ]
    }

    /// 조회 유형 태그.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::GetStockQuote => "get-stock-quote",
            QueryType::GetStockBasicInfo => "get-stock-basic-info",
            QueryType::GetIndexQuote => "get-index-quote",
        }
    }

    /// 업스트림 provider에 요청할 capability 이름.
    pub fn capability(&self) -> &'static str {
        match self {
            QueryType::GetStockQuote => "stock-quote",
            QueryType::GetStockBasicInfo => "stock-basic-info",
            QueryType::GetIndexQuote => "index-quote",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryType::all()
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unsupported query type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_type_from_str() {
        assert_eq!(
            "get-stock-quote".parse::<QueryType>().unwrap(),
            QueryType::GetStockQuote
        );
        assert_eq!(
            "GET-INDEX-QUOTE".parse::<QueryType>().unwrap(),
            QueryType::GetIndexQuote
        );
        assert!("UNSUPPORTED".parse::<QueryType>().is_err());
    }

    #[test]
    fn test_query_type_serde_tag() {
        let json = serde_json::to_string(&QueryType::GetStockBasicInfo).unwrap();
        assert_eq!(json, "\"get-stock-basic-info\"");
    }
}

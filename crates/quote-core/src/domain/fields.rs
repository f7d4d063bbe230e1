//! 조회 유형별 저장 분류.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::QueryType;

/// 영구 저장소에 기록할 데이터 분류 태그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClassification {
    StockQuote,
    StockBasicInfo,
    IndexQuote,
}

impl StorageClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClassification::StockQuote => "stock_quote",
            StorageClassification::StockBasicInfo => "stock_basic_info",
            StorageClassification::IndexQuote => "index_quote",
        }
    }
}

impl fmt::Display for StorageClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 조회 유형에 대응하는 저장 분류.
pub fn storage_classification(query_type: QueryType) -> StorageClassification {
    match query_type {
        QueryType::GetStockQuote => StorageClassification::StockQuote,
        QueryType::GetStockBasicInfo => StorageClassification::StockBasicInfo,
        QueryType::GetIndexQuote => StorageClassification::IndexQuote,
    }
}

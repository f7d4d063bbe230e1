//! 조회 요청 및 응답 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::PaginationMeta;
use crate::types::{Market, QueryType};

/// 조회 옵션.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// 캐시 사용 여부
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    /// 캐시 항목 최대 허용 나이 (초). 없으면 TTL 안에 있는 항목은 모두 신선함
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
    /// 요청 필드 목록
    #[serde(default)]
    pub requested_fields: Vec<String>,
}

fn default_use_cache() -> bool {
    true
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: default_use_cache(),
            max_age_seconds: None,
            requested_fields: Vec::new(),
        }
    }
}

/// 심볼 기반 조회 요청.
///
/// `symbols`에는 null 항목이 섞여 들어올 수 있으며, 이 경우 해당 항목만
/// 개별 에러로 기록되고 나머지 심볼은 정상 처리됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// 요청 심볼 목록
    pub symbols: Vec<Option<String>>,
    /// 조회 유형 태그 (예: "get-stock-quote")
    pub query_type: String,
    /// 선호 provider
    #[serde(default)]
    pub provider: Option<String>,
    /// 시장 힌트 (지정 시 모든 심볼에 적용)
    #[serde(default)]
    pub market: Option<Market>,
    /// 조회 옵션
    #[serde(default)]
    pub options: QueryOptions,
    /// 페이지 번호 (1부터 시작)
    #[serde(default)]
    pub page: Option<usize>,
    /// 페이지 크기
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryRequest {
    /// 새 조회 요청을 생성합니다.
    pub fn new<I, S>(symbols: I, query_type: QueryType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(|s| Some(s.into())).collect(),
            query_type: query_type.as_str().to_string(),
            provider: None,
            market: None,
            options: QueryOptions::default(),
            page: None,
            limit: None,
        }
    }

    /// null 항목을 포함할 수 있는 원시 심볼 목록으로 요청을 생성합니다.
    pub fn from_raw(symbols: Vec<Option<String>>, query_type: impl Into<String>) -> Self {
        Self {
            symbols,
            query_type: query_type.into(),
            provider: None,
            market: None,
            options: QueryOptions::default(),
            page: None,
            limit: None,
        }
    }

    /// 선호 provider를 설정합니다.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// 시장 힌트를 설정합니다.
    pub fn with_market(mut self, market: Market) -> Self {
        self.market = Some(market);
        self
    }

    /// 캐시 사용 여부를 설정합니다.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.options.use_cache = use_cache;
        self
    }

    /// 캐시 최대 허용 나이를 설정합니다.
    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.options.max_age_seconds = Some(seconds);
        self
    }

    /// 페이지네이션을 설정합니다.
    pub fn with_page(mut self, page: usize, limit: usize) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }
}

/// 결과 데이터의 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTag {
    /// 고속 캐시
    Cache,
    /// 업스트림 실시간 조회 (영구 저장소 fallback 포함)
    Realtime,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTag::Cache => write!(f, "CACHE"),
            SourceTag::Realtime => write!(f, "REALTIME"),
        }
    }
}

/// 심볼 하나의 조회 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolResult {
    pub symbol: String,
    pub market: Market,
    pub payload: Value,
    pub source: SourceTag,
    /// 캐시 항목이 저장된 시각 (캐시 적중 시)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

impl SymbolResult {
    /// 캐시 적중 결과.
    pub fn from_cache(
        symbol: impl Into<String>,
        market: Market,
        payload: Value,
        stored_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            market,
            payload,
            source: SourceTag::Cache,
            stored_at: Some(stored_at),
        }
    }

    /// 실시간 조회 결과.
    pub fn realtime(symbol: impl Into<String>, market: Market, payload: Value) -> Self {
        Self {
            symbol: symbol.into(),
            market,
            payload,
            source: SourceTag::Realtime,
            stored_at: None,
        }
    }
}

/// 개별 항목 에러 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    /// 구조적으로 잘못된 심볼 항목 (null, 빈 문자열)
    MalformedItem,
    /// 업스트림 조회 실패
    FetchFailed,
    /// 팬아웃 단계 타임아웃
    Timeout,
    /// 어느 계층에도 데이터 없음
    NotFound,
}

impl fmt::Display for ItemErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemErrorKind::MalformedItem => write!(f, "malformed_item"),
            ItemErrorKind::FetchFailed => write!(f, "fetch_failed"),
            ItemErrorKind::Timeout => write!(f, "timeout"),
            ItemErrorKind::NotFound => write!(f, "not_found"),
        }
    }
}

/// 응답에 포함되는 개별 항목 에러.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    /// 실패한 심볼 (null 항목이면 None)
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<Market>,
    pub kind: ItemErrorKind,
    pub reason: String,
}

impl ItemError {
    /// 새 항목 에러를 생성합니다.
    pub fn new(
        symbol: Option<String>,
        market: Option<Market>,
        kind: ItemErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol,
            market,
            kind,
            reason: reason.into(),
        }
    }

    /// 특정 심볼의 에러.
    pub fn for_symbol(
        symbol: impl Into<String>,
        market: Market,
        kind: ItemErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(Some(symbol.into()), Some(market), kind, reason)
    }
}

/// 조회 메타데이터.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub correlation_id: String,
    pub query_type: String,
    /// 요청에 포함된 전체 항목 수
    pub requested: usize,
    /// 유효한 심볼 수 (중복 제거 후)
    pub valid: usize,
    pub cache_hits: usize,
    pub realtime: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// 조회 응답.
///
/// 결과 0건, 에러 N건인 응답도 정상적인 응답입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub results: Vec<SymbolResult>,
    pub errors: Vec<ItemError>,
    pub pagination: PaginationMeta,
    pub metadata: QueryMetadata,
}

impl QueryResponse {
    /// 특정 심볼의 결과를 찾습니다.
    pub fn result_for(&self, symbol: &str) -> Option<&SymbolResult> {
        self.results.iter().find(|r| r.symbol == symbol)
    }

    /// 특정 심볼의 에러를 찾습니다.
    pub fn error_for(&self, symbol: &str) -> Option<&ItemError> {
        self.errors
            .iter()
            .find(|e| e.symbol.as_deref() == Some(symbol))
    }

    /// 특정 유형의 에러 개수.
    pub fn count_errors(&self, kind: ItemErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// 특정 출처의 결과 개수.
    pub fn count_source(&self, source: SourceTag) -> usize {
        self.results.iter().filter(|r| r.source == source).count()
    }
}

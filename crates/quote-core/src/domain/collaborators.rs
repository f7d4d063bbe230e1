//! 외부 협력자 추상화.
//!
//! 조회 파이프라인은 저장소나 provider 구현을 직접 알지 못하고
//! 이 모듈의 trait만 사용합니다. 구현체는 `quote-data` crate에 있습니다.
//!
//! - [`FastCache`]: TTL이 있는 고속 캐시 (Redis 등)
//! - [`PersistentStore`]: 만료 없는 영구 저장소 (PostgreSQL 등)
//! - [`UpstreamFetcher`]: 배치 조회를 지원하는 업스트림 provider
//! - [`MarketStatusProvider`]: 시장 거래 상태
//! - [`ChangeDetector`]: 의미 있는 데이터 변경 감지

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{QueryOptions, StorageClassification};
use crate::error::CoreResult;
use crate::types::{Market, StorageKey};

// =============================================================================
// 캐시 / 저장소
// =============================================================================

/// 저장된 데이터와 저장 시각.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// 현재 시각으로 새 항목을 생성합니다.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            stored_at: Utc::now(),
        }
    }

    /// 저장 시각을 지정하여 생성합니다.
    pub fn with_stored_at(data: Value, stored_at: DateTime<Utc>) -> Self {
        Self { data, stored_at }
    }

    /// 항목의 나이.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
    }

    /// `max_age_seconds` 기준으로 신선한지 확인합니다.
    ///
    /// 기준이 없거나 표현할 수 없을 만큼 크면 캐시에 남아 있는 항목은 모두 신선합니다.
    pub fn is_fresh(&self, max_age_seconds: Option<u64>, now: DateTime<Utc>) -> bool {
        let Some(max_age) = max_age_seconds else {
            return true;
        };

        match i64::try_from(max_age).ok().and_then(Duration::try_seconds) {
            Some(limit) => self.age(now) < limit,
            None => true,
        }
    }
}

/// TTL 기반 고속 캐시.
#[async_trait]
pub trait FastCache: Send + Sync {
    /// 항목을 조회합니다. 없거나 만료되었으면 `None`.
    async fn get(&self, key: &StorageKey) -> CoreResult<Option<CacheEntry>>;

    /// 항목을 저장합니다. 같은 키에 다시 쓰면 덮어씁니다.
    async fn set(&self, key: &StorageKey, data: &Value, ttl_secs: u64) -> CoreResult<()>;
}

/// 만료 없는 영구 저장소.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// 항목을 조회합니다.
    async fn get(&self, key: &StorageKey) -> CoreResult<Option<CacheEntry>>;

    /// 항목을 저장(upsert)합니다.
    async fn set(
        &self,
        key: &StorageKey,
        data: &Value,
        classification: StorageClassification,
    ) -> CoreResult<()>;
}

// =============================================================================
// 업스트림 provider
// =============================================================================

/// 업스트림 배치 조회 요청.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub symbols: Vec<String>,
    pub capability: String,
    pub provider_preference: Option<String>,
    pub options: QueryOptions,
}

impl FetchRequest {
    /// 새 조회 요청을 생성합니다.
    pub fn new(symbols: Vec<String>, capability: impl Into<String>) -> Self {
        Self {
            symbols,
            capability: capability.into(),
            provider_preference: None,
            options: QueryOptions::default(),
        }
    }

    /// 선호 provider를 설정합니다.
    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider_preference = provider;
        self
    }

    /// 조회 옵션을 설정합니다.
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// 심볼 단위 업스트림 실패.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub symbol: String,
    pub reason: String,
}

/// 업스트림 배치 조회 응답.
///
/// `data`는 요청 심볼 순서와 인덱스가 일치하며, 데이터가 없는 자리는 `None`입니다.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub data: Vec<Option<Value>>,
    pub failures: Vec<FetchFailure>,
    pub provider_used: String,
}

impl FetchResponse {
    /// 요청 심볼 순서에 맞춘 빈 응답.
    pub fn empty(len: usize, provider: impl Into<String>) -> Self {
        Self {
            data: vec![None; len],
            failures: Vec::new(),
            provider_used: provider.into(),
        }
    }

    /// 인덱스의 데이터.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.data.get(index).and_then(|v| v.as_ref())
    }

    /// 심볼의 실패 사유.
    pub fn failure_reason(&self, symbol: &str) -> Option<&str> {
        self.failures
            .iter()
            .find(|f| f.symbol == symbol)
            .map(|f| f.reason.as_str())
    }

    /// 데이터가 채워진 항목 수.
    pub fn filled(&self) -> usize {
        self.data.iter().filter(|v| v.is_some()).count()
    }
}

/// 배치 조회를 지원하는 업스트림 provider.
///
/// 부분 결과를 반환할 수 있으며, 심볼 단위 실패는 `failures`로 보고합니다.
/// `Err`는 호출 전체가 실패한 경우에만 반환합니다.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// 심볼 배치를 조회합니다.
    async fn fetch(&self, request: &FetchRequest) -> CoreResult<FetchResponse>;

    /// provider 이름.
    fn name(&self) -> &str;
}

// =============================================================================
// 시장 상태 / 변경 감지
// =============================================================================

/// 시장 거래 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub is_trading: bool,
    pub is_holiday: bool,
}

impl MarketStatus {
    /// 거래 중.
    pub fn trading() -> Self {
        Self {
            is_trading: true,
            is_holiday: false,
        }
    }

    /// 장 마감 (평일).
    pub fn closed() -> Self {
        Self {
            is_trading: false,
            is_holiday: false,
        }
    }

    /// 휴장일.
    pub fn holiday() -> Self {
        Self {
            is_trading: false,
            is_holiday: true,
        }
    }
}

/// 시장 상태 제공자.
#[async_trait]
pub trait MarketStatusProvider: Send + Sync {
    /// 시장의 현재 상태를 조회합니다.
    async fn status(&self, market: Market) -> CoreResult<MarketStatus>;
}

/// 변경 감지 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    /// 캐시를 덮어쓸 만큼 의미 있는 변경인지
    pub changed: bool,
    pub details: String,
    /// 0.0 ~ 1.0
    pub confidence: f64,
}

impl ChangeReport {
    /// 변경 있음.
    pub fn changed(details: impl Into<String>, confidence: f64) -> Self {
        Self {
            changed: true,
            details: details.into(),
            confidence,
        }
    }

    /// 변경 없음.
    pub fn unchanged(details: impl Into<String>) -> Self {
        Self {
            changed: false,
            details: details.into(),
            confidence: 1.0,
        }
    }
}

/// 의미 있는 데이터 변경 감지기.
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    /// 새 데이터가 이전 스냅샷 대비 의미 있게 변했는지 판단합니다.
    async fn detect(
        &self,
        symbol: &str,
        new_payload: &Value,
        previous: Option<&Value>,
        market: Market,
        status: &MarketStatus,
    ) -> CoreResult<ChangeReport>;
}

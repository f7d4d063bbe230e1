//! 시세 서비스의 에러 타입.
//!
//! 외부 협력자(캐시, 저장소, 업스트림 provider 등) 호출 실패를 표현합니다.
//! 심볼 단위 실패는 에러가 아니라 응답 데이터(`ItemError`)로 다룹니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 고속 캐시 에러
    #[error("캐시 에러: {0}")]
    Cache(String),

    /// 영구 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 업스트림 provider 에러
    #[error("업스트림 에러: {0}")]
    Upstream(String),

    /// 시장 상태 조회 에러
    #[error("시장 상태 에러: {0}")]
    MarketStatus(String),

    /// 데이터 변경 감지 에러
    #[error("변경 감지 에러: {0}")]
    ChangeDetection(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 타임아웃
    #[error("타임아웃: {0}")]
    Timeout(String),
}

impl CoreError {
    /// 재시도하면 성공할 가능성이 있는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::Cache(_) | CoreError::Upstream(_) | CoreError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

/// 핵심 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(CoreError::Upstream("503".to_string()).is_transient());
        assert!(CoreError::Timeout("cache".to_string()).is_transient());
        assert!(!CoreError::Config("bad".to_string()).is_transient());
    }
}

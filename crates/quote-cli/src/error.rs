//! 에러 타입 정의.

use thiserror::Error;

/// CLI 구성 에러.
#[derive(Debug, Error)]
pub enum CliError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 업스트림 provider 초기화 에러
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// 메트릭 exporter 에러
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// 로깅 초기화 에러
    #[error("Logging error: {0}")]
    Logging(String),

    /// 조회 요청 에러
    #[error(transparent)]
    Query(#[from] quote_query::QueryError),
}

impl From<quote_data::DataError> for CliError {
    fn from(err: quote_data::DataError) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CliError>;

//! 데이터 모듈 오류 타입.

use quote_core::CoreError;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<DataError> for CoreError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::CacheError(msg) => CoreError::Cache(msg),
            DataError::SerializationError(msg) | DataError::ParseError(msg) => {
                CoreError::Serialization(msg)
            }
            DataError::FetchError(msg) => CoreError::Upstream(msg),
            other @ (DataError::ConnectionError(_)
            | DataError::QueryError(_)
            | DataError::PoolExhausted) => CoreError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_core_error() {
        let err: CoreError = DataError::CacheError("down".to_string()).into();
        assert!(matches!(err, CoreError::Cache(_)));

        let err: CoreError = DataError::PoolExhausted.into();
        assert!(matches!(err, CoreError::Storage(_)));

        let err: CoreError = DataError::FetchError("429".to_string()).into();
        assert!(matches!(err, CoreError::Upstream(_)));
    }
}

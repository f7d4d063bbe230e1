//! 조회 오류 타입.
//!
//! 동기적으로 반환되는 오류는 구조적으로 잘못된 요청뿐입니다.
//! 심볼 단위 실패는 응답의 `errors`에 담깁니다.

use thiserror::Error;

/// 조회 요청 오류.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// 지원하지 않는 조회 유형
    #[error("Unsupported query type: {0}")]
    UnsupportedQueryType(String),

    /// 잘못된 요청 파라미터
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

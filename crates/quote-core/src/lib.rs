//! # Quote Core
//!
//! 시세 조회 서비스의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! - 시장 분류 및 저장 키
//! - 조회 요청/응답 모델과 개별 항목 에러
//! - 외부 협력자 trait (캐시, 영구 저장소, 업스트림, 시장 상태, 변경 감지)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use self::config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;

//! 시세 조회 명령행 도구.
//!
//! 이 crate는 조회 파이프라인을 실행하는 바이너리를 제공합니다:
//! - `query`: 1회 조회 후 JSON 응답 출력
//! - `watch`: 주기적으로 조회하여 캐시를 따뜻하게 유지

pub mod bootstrap;
pub mod error;
pub mod request;
pub mod stats;

pub use bootstrap::{build, install_metrics_exporter, Services};
pub use error::{CliError, Result};
pub use request::QueryArgs;
pub use stats::QueryStats;

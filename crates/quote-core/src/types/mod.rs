//! 서비스 전반에서 사용되는 공통 타입.

mod market;
mod query_type;
mod storage_key;

pub use market::*;
pub use query_type::*;
pub use storage_key::*;

//! 시세 조회를 위한 도메인 모델.

mod collaborators;
mod fields;
mod pagination;
mod query;

pub use collaborators::*;
pub use fields::*;
pub use pagination::*;
pub use query::*;

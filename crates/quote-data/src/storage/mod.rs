//! 저장 계층.
//!
//! - Redis: TTL 기반 고속 캐시
//! - PostgreSQL: 만료 없는 스냅샷 저장소
//! - Memory: 외부 저장소 없이 동작하기 위한 인메모리 대체 구현

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::MemoryCache;
pub use postgres::SnapshotStore;
pub use self::redis::RedisCache;

//! 백테스트용 과거 가격 데이터 관리.
//!
//! - `HistoricalDataProvider` - 캐시 우선 로드와 외부 소스 페치
//! - `BarCache` - 로컬 캐시 (메모리, PostgreSQL)
//! - `PriceHistorySource` - 외부 가격 이력 소스 (Yahoo Finance)

pub mod cache;
pub mod error;
pub mod pool;
pub mod provider;
pub mod source;

pub use cache::{BarCache, InMemoryBarCache, PgBarCache};
pub use error::{DataError, Result};
pub use pool::{connect_pool, migrate};
pub use provider::HistoricalDataProvider;
pub use source::{DateRange, PriceHistorySource, YahooPriceSource};

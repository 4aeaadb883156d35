//! 과거 바 로컬 캐시.
//!
//! 키는 (심볼, 타임프레임, 타임스탬프)이며 같은 바를 여러 번 저장해도
//! 중복되지 않아야 합니다.

mod memory;
mod postgres;

pub use memory::InMemoryBarCache;
pub use postgres::{BarRecord, PgBarCache};

use crate::error::Result;
use async_trait::async_trait;
use backtest_core::{HistoricalBar, Timeframe};
use chrono::{DateTime, Utc};

/// 과거 바 캐시.
#[async_trait]
pub trait BarCache: Send + Sync {
    /// `[start, end)` 구간의 바를 타임스탬프 오름차순으로 조회합니다.
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoricalBar>>;

    /// 바를 저장하고 새로 추가된 개수를 반환합니다. 이미 있는 바는 건너뜁니다.
    async fn upsert_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[HistoricalBar],
    ) -> Result<usize>;
}

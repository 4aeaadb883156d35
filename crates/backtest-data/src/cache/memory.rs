//! 프로세스 내 바 캐시.

use super::BarCache;
use crate::error::Result;
use async_trait::async_trait;
use backtest_core::{HistoricalBar, Timeframe};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type SeriesKey = (String, Timeframe);

/// 메모리 기반 바 캐시.
///
/// 심볼/타임프레임별로 타임스탬프 정렬 맵을 유지합니다.
#[derive(Debug, Default)]
pub struct InMemoryBarCache {
    series: RwLock<HashMap<SeriesKey, BTreeMap<DateTime<Utc>, HistoricalBar>>>,
}

impl InMemoryBarCache {
    /// 빈 캐시를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 전체 바 수.
    pub async fn len(&self) -> usize {
        self.series.read().await.values().map(BTreeMap::len).sum()
    }

    /// 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BarCache for InMemoryBarCache {
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoricalBar>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let series = self.series.read().await;
        Ok(series
            .get(&(symbol.to_string(), timeframe))
            .map(|bars| bars.range(start..end).map(|(_, bar)| bar.clone()).collect())
            .unwrap_or_default())
    }

    async fn upsert_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[HistoricalBar],
    ) -> Result<usize> {
        let mut series = self.series.write().await;
        let entry = series.entry((symbol.to_string(), timeframe)).or_default();

        let mut inserted = 0;
        for bar in bars {
            if !entry.contains_key(&bar.timestamp) {
                entry.insert(bar.timestamp, bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

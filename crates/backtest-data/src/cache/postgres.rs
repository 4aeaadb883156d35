//! PostgreSQL 바 캐시.
//!
//! `historical_bars` 테이블 (기본키: symbol, timeframe, open_time)에
//! UNNEST 일괄 삽입으로 저장합니다.

use super::BarCache;
use crate::error::{DataError, Result};
use async_trait::async_trait;
use backtest_core::{HistoricalBar, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, instrument};

/// 한 번에 삽입할 최대 행 수.
const INSERT_CHUNK_SIZE: usize = 500;

/// 바 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct BarRecord {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl From<BarRecord> for HistoricalBar {
    fn from(r: BarRecord) -> Self {
        HistoricalBar::new(r.open_time, r.open, r.high, r.low, r.close, r.volume)
    }
}

/// PostgreSQL 기반 바 캐시.
#[derive(Debug, Clone)]
pub struct PgBarCache {
    pool: PgPool,
}

impl PgBarCache {
    /// 기존 연결 풀로 캐시를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BarCache for PgBarCache {
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoricalBar>> {
        let records: Vec<BarRecord> = sqlx::query_as(
            r#"
            SELECT open_time, open, high, low, close, volume
            FROM historical_bars
            WHERE symbol = $1 AND timeframe = $2 AND open_time >= $3 AND open_time < $4
            ORDER BY open_time ASC
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        debug!(symbol = symbol, timeframe = %timeframe, count = records.len(), "캐시 조회");
        Ok(records.into_iter().map(HistoricalBar::from).collect())
    }

    #[instrument(skip(self, bars), fields(count = bars.len()))]
    async fn upsert_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[HistoricalBar],
    ) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0;
        for chunk in bars.chunks(INSERT_CHUNK_SIZE) {
            let open_times: Vec<DateTime<Utc>> = chunk.iter().map(|b| b.timestamp).collect();
            let opens: Vec<Decimal> = chunk.iter().map(|b| b.open).collect();
            let highs: Vec<Decimal> = chunk.iter().map(|b| b.high).collect();
            let lows: Vec<Decimal> = chunk.iter().map(|b| b.low).collect();
            let closes: Vec<Decimal> = chunk.iter().map(|b| b.close).collect();
            let volumes: Vec<Decimal> = chunk.iter().map(|b| b.volume).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO historical_bars
                    (symbol, timeframe, open_time, open, high, low, close, volume, fetched_at)
                SELECT $1, $2, t.*, NOW() FROM UNNEST(
                    $3::timestamptz[],
                    $4::numeric[], $5::numeric[], $6::numeric[], $7::numeric[], $8::numeric[]
                ) AS t(open_time, open, high, low, close, volume)
                ON CONFLICT (symbol, timeframe, open_time) DO NOTHING
                "#,
            )
            .bind(symbol)
            .bind(timeframe.as_str())
            .bind(&open_times)
            .bind(&opens)
            .bind(&highs)
            .bind(&lows)
            .bind(&closes)
            .bind(&volumes)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            inserted += result.rows_affected() as usize;
        }

        info!(symbol = symbol, timeframe = %timeframe, inserted = inserted, "바 데이터 캐시에 저장");
        Ok(inserted)
    }
}

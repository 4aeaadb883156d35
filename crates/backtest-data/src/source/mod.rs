//! 외부 가격 이력 소스.
//!
//! 소스는 요청 한도 초과와 데이터 없음 상황을 `DataError::RateLimited`,
//! `DataError::NoData`로 구분해 반환해야 합니다.

mod yahoo;

pub use yahoo::YahooPriceSource;

use crate::error::Result;
use async_trait::async_trait;
use backtest_core::{HistoricalBar, Timeframe};
use chrono::{DateTime, Days, NaiveDate, Utc};

/// 시작일과 종료일을 모두 포함하는 날짜 범위.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// 시작일
    pub start: NaiveDate,
    /// 종료일 (포함)
    pub end: NaiveDate,
}

impl DateRange {
    /// 새 날짜 범위를 생성합니다.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// 범위의 달력일 수 (양끝 포함). 역전된 범위는 0.
    pub fn calendar_days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }

    /// 시작일 00:00 UTC.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// 종료일 다음 날 00:00 UTC (배타적 상한).
    pub fn end_time_exclusive(&self) -> DateTime<Utc> {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
    }
}

/// 가격 이력 소스.
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// 소스 이름 (로그용).
    fn name(&self) -> &str;

    /// 범위 내 바를 타임스탬프 오름차순으로 가져옵니다.
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Vec<HistoricalBar>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_calendar_days() {
        assert_eq!(DateRange::new(date(2024, 1, 1), date(2024, 1, 1)).calendar_days(), 1);
        assert_eq!(DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).calendar_days(), 366);
        assert_eq!(DateRange::new(date(2024, 2, 1), date(2024, 1, 1)).calendar_days(), 0);
    }

    #[test]
    fn test_time_bounds() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31));
        assert_eq!(range.start_time().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(range.end_time_exclusive().to_rfc3339(), "2024-02-01T00:00:00+00:00");
    }
}

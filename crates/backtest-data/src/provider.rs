//! 캐시 우선 과거 데이터 제공자.
//!
//! ```text
//! load_historical_bars(symbol, horizon, start, end)
//!   │
//!   ├─ 1. 심볼+타임프레임 Lock 획득 (동시 실행이 같은 범위를 중복 페치하지 않음)
//!   ├─ 2. 캐시 조회
//!   ├─ 3. 예상 바 수 추정 (달력일 × 5/7 × (1 - 휴장일 비율))
//!   ├─ 4. 커버리지 < 임계값 또는 캐시 비어 있음
//!   │      └─ 누락 구간 페치 → 캐시 저장 (중복 무시) → 캐시 재조회
//!   └─ 5. 최소 바 수 미만이면 DataUnavailable (소스 오류가 있었다면 cause로 첨부)
//! ```

use crate::cache::BarCache;
use crate::error::{DataError, Result};
use crate::source::{DateRange, PriceHistorySource};
use backtest_core::{DataConfig, HistoricalBar, TimeHorizon, Timeframe};
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// 심볼+타임프레임별 페치 Lock 맵.
type FetchLockMap = Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>;

/// 캐시 우선 과거 데이터 제공자.
pub struct HistoricalDataProvider {
    cache: Arc<dyn BarCache>,
    source: Arc<dyn PriceHistorySource>,
    config: DataConfig,
    fetch_locks: FetchLockMap,
}

impl HistoricalDataProvider {
    /// 기본 설정으로 제공자를 생성합니다.
    pub fn new(cache: Arc<dyn BarCache>, source: Arc<dyn PriceHistorySource>) -> Self {
        Self {
            cache,
            source,
            config: DataConfig::default(),
            fetch_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 설정을 지정합니다.
    pub fn with_config(mut self, config: DataConfig) -> Self {
        self.config = config;
        self
    }

    /// 현재 설정.
    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// 투자 기간에 맞는 바를 시간순으로 로드합니다.
    ///
    /// 페치 이후에도 `min_bars`보다 적으면 `DataError::DataUnavailable`을
    /// 반환합니다. 페치가 소스 오류로 실패했다면 `cause`에 담깁니다.
    #[instrument(skip(self), fields(timeframe = %time_horizon.timeframe()))]
    pub async fn load_historical_bars(
        &self,
        symbol: &str,
        time_horizon: TimeHorizon,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<HistoricalBar>> {
        let timeframe = time_horizon.timeframe();
        let range = DateRange::new(start_date, end_date);

        let lock = self.get_or_create_lock(&format!("{}:{}", symbol, timeframe)).await;
        let _guard = lock.lock().await;

        let cached = self.read_cache(symbol, timeframe, range).await?;
        let expected = self.estimate_expected_bars(timeframe, range);
        debug!(cached = cached.len(), expected = expected, "캐시 커버리지 확인");

        let (bars, source_error) = if self.needs_fetch(cached.len(), expected) {
            let fetch_range = missing_range(range, &cached);
            let source_error = self.fetch_and_cache(symbol, timeframe, fetch_range).await?;
            (self.read_cache(symbol, timeframe, range).await?, source_error)
        } else {
            (cached, None)
        };

        if bars.len() < self.config.min_bars {
            warn!(
                symbol = symbol,
                available = bars.len(),
                required = self.config.min_bars,
                cause = ?source_error,
                "과거 데이터 부족"
            );
            return Err(DataError::DataUnavailable {
                symbol: symbol.to_string(),
                available: bars.len(),
                required: self.config.min_bars,
                cause: source_error.map(Box::new),
            });
        }

        info!(symbol = symbol, count = bars.len(), "과거 데이터 로드 완료");
        Ok(bars)
    }

    /// 달력일 범위에서 예상 바 수를 추정합니다.
    ///
    /// 거래일 = 달력일 × 5/7 × (1 - 휴장일 비율). 장중 타임프레임은
    /// 거래일당 시간봉 수를 곱하고, 주봉은 5거래일당 1개입니다.
    pub fn estimate_expected_bars(&self, timeframe: Timeframe, range: DateRange) -> usize {
        let trading_days = Decimal::from(range.calendar_days()) * dec!(5) / dec!(7)
            * (Decimal::ONE - self.config.holiday_discount);

        let bars_per_day = match timeframe {
            Timeframe::W1 => dec!(0.2),
            tf if tf.is_intraday() => {
                Decimal::from(self.config.intraday_bars_per_day) * Decimal::from(3600u64)
                    / Decimal::from(tf.as_secs())
            }
            _ => Decimal::ONE,
        };

        (trading_days * bars_per_day)
            .floor()
            .to_usize()
            .unwrap_or(0)
    }

    fn needs_fetch(&self, cached: usize, expected: usize) -> bool {
        if cached == 0 {
            return true;
        }
        Decimal::from(cached) < Decimal::from(expected) * self.config.coverage_threshold
    }

    async fn read_cache(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Vec<HistoricalBar>> {
        self.cache
            .get_bars(symbol, timeframe, range.start_time(), range.end_time_exclusive())
            .await
    }

    /// 외부 소스에서 가져와 캐시에 저장합니다.
    ///
    /// 소스 오류(요청 한도, 데이터 없음)는 에러로 전파하지 않고 반환하며,
    /// 호출자는 캐시에 남은 데이터로 진행합니다.
    async fn fetch_and_cache(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Option<DataError>> {
        info!(
            symbol = symbol,
            source = self.source.name(),
            start = %range.start,
            end = %range.end,
            "외부 소스에서 과거 데이터 페치"
        );

        let fetched = match self.source.fetch(symbol, timeframe, range).await {
            Ok(bars) => bars,
            Err(e) if e.is_source_error() => {
                warn!(symbol = symbol, error = %e, "과거 데이터 페치 실패, 캐시 데이터로 진행");
                return Ok(Some(e));
            }
            Err(e) => return Err(e),
        };

        let (start, end) = (range.start_time(), range.end_time_exclusive());
        let in_range: Vec<HistoricalBar> = fetched
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp < end)
            .collect();

        let inserted = self.cache.upsert_bars(symbol, timeframe, &in_range).await?;
        debug!(fetched = in_range.len(), inserted = inserted, "캐시 업데이트 완료");
        Ok(None)
    }

    async fn get_or_create_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let locks = self.fetch_locks.read().await;
        if let Some(lock) = locks.get(key) {
            return lock.clone();
        }
        drop(locks);

        let mut locks = self.fetch_locks.write().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// 캐시에 없는 앞/뒤 구간을 계산합니다.
///
/// 양쪽 모두 비었거나 중간에만 구멍이 있으면 전체 범위를 반환합니다.
fn missing_range(range: DateRange, cached: &[HistoricalBar]) -> DateRange {
    let (Some(first), Some(last)) = (cached.first(), cached.last()) else {
        return range;
    };
    let first_day = first.timestamp.date_naive();
    let last_day = last.timestamp.date_naive();

    let head_missing = first_day > range.start;
    let tail_missing = last_day < range.end;

    match (head_missing, tail_missing) {
        (true, false) => DateRange::new(range.start, first_day.checked_sub_days(Days::new(1)).unwrap_or(range.start)),
        (false, true) => DateRange::new(last_day.checked_add_days(Days::new(1)).unwrap_or(range.end), range.end),
        _ => range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryBarCache;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct NoSource;

    #[async_trait]
    impl PriceHistorySource for NoSource {
        fn name(&self) -> &str {
            "none"
        }

        async fn fetch(&self, symbol: &str, _: Timeframe, _: DateRange) -> Result<Vec<HistoricalBar>> {
            Err(DataError::NoData(symbol.to_string()))
        }
    }

    fn provider() -> HistoricalDataProvider {
        HistoricalDataProvider::new(Arc::new(InMemoryBarCache::new()), Arc::new(NoSource))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar_on(d: NaiveDate) -> HistoricalBar {
        let ts = Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap());
        HistoricalBar::new(ts, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1))
    }

    #[test]
    fn test_estimate_daily_bars() {
        let p = provider();
        // 366 × 5/7 × 0.96 = 250.97
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31));
        assert_eq!(p.estimate_expected_bars(Timeframe::D1, range), 250);
        // 28 × 5/7 × 0.96 = 19.2
        let month = DateRange::new(date(2024, 2, 1), date(2024, 2, 28));
        assert_eq!(p.estimate_expected_bars(Timeframe::D1, month), 19);
    }

    #[test]
    fn test_estimate_intraday_and_weekly_bars() {
        let p = provider();
        let range = DateRange::new(date(2024, 2, 1), date(2024, 2, 28));
        assert_eq!(p.estimate_expected_bars(Timeframe::H1, range), 134);
        assert_eq!(p.estimate_expected_bars(Timeframe::W1, range), 3);
    }

    #[test]
    fn test_needs_fetch_threshold() {
        let p = provider();
        assert!(p.needs_fetch(0, 0));
        assert!(p.needs_fetch(49, 100));
        assert!(!p.needs_fetch(50, 100));
        assert!(!p.needs_fetch(3, 0));
    }

    #[test]
    fn test_missing_range() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31));

        assert_eq!(missing_range(range, &[]), range);

        let tail = [bar_on(date(2024, 1, 1)), bar_on(date(2024, 1, 10))];
        assert_eq!(missing_range(range, &tail), DateRange::new(date(2024, 1, 11), date(2024, 1, 31)));

        let head = [bar_on(date(2024, 1, 20)), bar_on(date(2024, 1, 31))];
        assert_eq!(missing_range(range, &head), DateRange::new(date(2024, 1, 1), date(2024, 1, 19)));

        let both = [bar_on(date(2024, 1, 5)), bar_on(date(2024, 1, 20))];
        assert_eq!(missing_range(range, &both), range);
    }
}

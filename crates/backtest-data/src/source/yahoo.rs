//! Yahoo Finance 가격 이력 소스.

use super::{DateRange, PriceHistorySource};
use crate::error::{DataError, Result};
use async_trait::async_trait;
use backtest_core::{HistoricalBar, Timeframe};
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::debug;

/// Yahoo Finance 커넥터 래퍼.
pub struct YahooPriceSource {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooPriceSource {
    /// 새 커넥터를 생성합니다.
    pub fn new() -> Result<Self> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl PriceHistorySource for YahooPriceSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: DateRange,
    ) -> Result<Vec<HistoricalBar>> {
        let interval = timeframe.to_yahoo_interval();
        let start = to_offset_datetime(range.start)?;
        // 종료일 포함
        let end = to_offset_datetime(range.end)? + time::Duration::days(1);

        debug!(
            symbol = symbol,
            interval = interval,
            start = %range.start,
            end = %range.end,
            "Yahoo Finance API 날짜 범위 호출"
        );

        let response = self
            .connector
            .get_quote_history_interval(symbol, start, end, interval)
            .await
            .map_err(|e| classify_error(symbol, e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::NoData(format!("{} ({}): {}", symbol, interval, e)))?;

        if quotes.is_empty() {
            return Err(DataError::NoData(format!("{} ({})", symbol, interval)));
        }

        let mut bars = quotes
            .iter()
            .map(|q| {
                let timestamp = Utc
                    .timestamp_opt(q.timestamp as i64, 0)
                    .single()
                    .ok_or_else(|| DataError::ParseError(format!("잘못된 타임스탬프: {}", q.timestamp)))?;
                Ok(HistoricalBar::new(
                    timestamp,
                    to_decimal(q.open)?,
                    to_decimal(q.high)?,
                    to_decimal(q.low)?,
                    to_decimal(q.close)?,
                    Decimal::from(q.volume),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

/// 요청 한도 초과 응답은 별도 에러로 분류합니다.
fn classify_error(symbol: &str, message: String) -> DataError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit") {
        DataError::RateLimited(format!("{}: {}", symbol, message))
    } else if lower.contains("no data") || lower.contains("not found") || lower.contains("no quotes") {
        DataError::NoData(format!("{}: {}", symbol, message))
    } else {
        DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", symbol, message))
    }
}

fn to_decimal(value: f64) -> Result<Decimal> {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(6))
        .ok_or_else(|| DataError::ParseError(format!("가격 변환 실패: {}", value)))
}

/// NaiveDate를 OffsetDateTime(자정 UTC)으로 변환.
fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime> {
    let month = time::Month::try_from(date.month() as u8)
        .map_err(|e| DataError::InvalidData(e.to_string()))?;
    let day = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
        .map_err(|e| DataError::InvalidData(e.to_string()))?;
    Ok(day.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error("AAPL", "HTTP 429 Too Many Requests".into()),
            DataError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error("ZZZZ", "No data found, symbol may be delisted".into()),
            DataError::NoData(_)
        ));
        assert!(matches!(
            classify_error("AAPL", "connection reset".into()),
            DataError::FetchError(_)
        ));
    }

    #[test]
    fn test_to_offset_datetime() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let odt = to_offset_datetime(date).unwrap();
        assert_eq!(odt.unix_timestamp(), 1_709_164_800);
    }

    #[test]
    fn test_to_decimal_rejects_nan() {
        assert!(to_decimal(f64::NAN).is_err());
        assert_eq!(to_decimal(12.5).unwrap(), Decimal::new(125, 1));
    }
}

//! 과거 가격 데이터 타입.

use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV 가격 바.
///
/// 외부에서 생성되며 불변입니다. 한 심볼/간격 안에서 타임스탬프 오름차순으로
/// 정렬되고 중복이 없습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalBar {
    /// 바 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Quantity,
}

impl HistoricalBar {
    /// 새 바를 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 고가-저가 범위.
    pub fn range(&self) -> Price {
        self.high - self.low
    }
}

/// 바가 타임스탬프 기준으로 엄격한 오름차순인지 확인합니다.
pub fn is_chronological(bars: &[HistoricalBar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn bar(day: i64) -> HistoricalBar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        HistoricalBar::new(ts, dec!(10), dec!(11), dec!(9), dec!(10.5), dec!(1000))
    }

    #[test]
    fn test_range() {
        assert_eq!(bar(0).range(), dec!(2));
    }

    #[test]
    fn test_is_chronological() {
        assert!(is_chronological(&[bar(0), bar(1), bar(2)]));
        assert!(!is_chronological(&[bar(0), bar(2), bar(1)]));
        assert!(!is_chronological(&[bar(0), bar(0)]));
        assert!(is_chronological(&[]));
    }
}

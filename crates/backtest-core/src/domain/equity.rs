//! 자산 곡선 스냅샷.

use crate::types::{DecimalExt, Percentage};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 바 하나에 대한 포트폴리오 자산 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurvePoint {
    /// 바 타임스탬프
    pub timestamp: DateTime<Utc>,
    /// 현금
    pub cash: Decimal,
    /// 오픈 포지션 평가 금액 합계
    pub stock_value: Decimal,
    /// 총 자산 (현금 + 평가 금액)
    pub total_equity: Decimal,
    /// 총 자산 최고치 (단조 비감소)
    pub portfolio_high_water_mark: Decimal,
    /// 최고치 대비 하락 금액 (≤ 0)
    pub drawdown: Decimal,
    /// 최고치 대비 하락률 (%, ≤ 0)
    pub drawdown_pct: Percentage,
    /// 초기 자본 대비 누적 수익률 (%)
    pub cumulative_return_pct: Percentage,
    /// 스냅샷 시점까지의 누적 거래 수
    pub trade_count: u32,
}

impl EquityCurvePoint {
    /// `cash + stock_value == total_equity`가 허용 오차 이내인지 확인합니다.
    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        (self.cash + self.stock_value).approx_eq(self.total_equity, tolerance)
    }
}

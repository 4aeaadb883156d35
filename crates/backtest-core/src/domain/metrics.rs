//! 백테스트 성과 지표 레코드.
//!
//! 계산은 엔진 crate의 성과 분석기가 담당하고, 여기서는 저장과 표시에
//! 필요한 형태만 정의합니다. 분모가 0이거나 표본이 부족한 비율 지표는
//! NaN 대신 `None`입니다.

use crate::types::Percentage;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 백테스트 실행의 최종 성과 지표.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // 거래 통계
    /// 총 거래 수 (매도 거래 수)
    pub total_trades: u32,
    /// 수익 거래 수
    pub winning_trades: u32,
    /// 손실 거래 수
    pub losing_trades: u32,
    /// 승률 (%)
    pub win_rate: Percentage,

    // 수익
    /// 최종 자산
    pub final_equity: Decimal,
    /// 최종 현금
    pub final_cash: Decimal,
    /// 총 수익 금액
    pub total_return: Decimal,
    /// 총 수익률 (%)
    pub total_return_pct: Percentage,

    // 위험 조정 수익
    /// 연율화 샤프 비율
    pub sharpe_ratio: Option<Decimal>,
    /// 연율화 소르티노 비율
    pub sortino_ratio: Option<Decimal>,
    /// 수익률 관측 수
    pub return_observations: u32,

    // 낙폭
    /// 최대 낙폭 금액 (≤ 0)
    pub max_drawdown: Decimal,
    /// 최대 낙폭 시점의 낙폭률 (%, ≤ 0)
    pub max_drawdown_pct: Percentage,
    /// 최대 낙폭 발생 시점
    pub max_drawdown_date: Option<DateTime<Utc>>,

    // 거래 품질
    /// 프로핏 팩터
    pub profit_factor: Option<Decimal>,
    /// 기대값 (%)
    pub expectancy: Percentage,
    /// 평균 수익 거래 수익률 (%)
    pub avg_win_pct: Percentage,
    /// 평균 손실 거래 손실률 (%, 절대값)
    pub avg_loss_pct: Percentage,
    /// 최대 수익 거래
    pub largest_win: Decimal,
    /// 최대 손실 거래
    pub largest_loss: Decimal,
    /// 평균 보유 기간 (일)
    pub avg_holding_period_days: Option<Decimal>,

    // 비용
    /// 총 수수료
    pub total_commission: Decimal,
    /// 총 슬리피지 비용
    pub total_slippage: Decimal,
}

impl PerformanceMetrics {
    /// 거래와 자산 곡선이 없는 실행의 지표.
    pub fn empty(initial_cash: Decimal) -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: Decimal::ZERO,
            final_equity: initial_cash,
            final_cash: initial_cash,
            total_return: Decimal::ZERO,
            total_return_pct: Decimal::ZERO,
            sharpe_ratio: None,
            sortino_ratio: None,
            return_observations: 0,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            max_drawdown_date: None,
            profit_factor: None,
            expectancy: Decimal::ZERO,
            avg_win_pct: Decimal::ZERO,
            avg_loss_pct: Decimal::ZERO,
            largest_win: Decimal::ZERO,
            largest_loss: Decimal::ZERO,
            avg_holding_period_days: None,
            total_commission: Decimal::ZERO,
            total_slippage: Decimal::ZERO,
        }
    }

    /// 텍스트 요약 리포트.
    pub fn summary(&self) -> String {
        fn opt(value: Option<Decimal>) -> String {
            value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v))
        }

        format!(
            "백테스트 결과 요약\n\
             ═══════════════════════════════════════\n\
             최종 자산: {:.2}\n\
             최종 현금: {:.2}\n\
             순수익: {:.2}\n\
             총 수익률: {:.2}%\n\
             ───────────────────────────────────────\n\
             총 거래: {} (승 {} / 패 {})\n\
             승률: {:.1}%\n\
             프로핏 팩터: {}\n\
             기대값: {:.2}%\n\
             ───────────────────────────────────────\n\
             샤프 비율: {}\n\
             소르티노 비율: {}\n\
             최대 낙폭: {:.2}% ({})\n\
             ───────────────────────────────────────\n\
             총 수수료: {:.2}\n\
             총 슬리피지: {:.2}\n\
             ═══════════════════════════════════════",
            self.final_equity,
            self.final_cash,
            self.total_return,
            self.total_return_pct,
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.win_rate,
            opt(self.profit_factor),
            self.expectancy,
            opt(self.sharpe_ratio),
            opt(self.sortino_ratio),
            self.max_drawdown_pct,
            self.max_drawdown_date
                .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string()),
            self.total_commission,
            self.total_slippage,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_metrics() {
        let metrics = PerformanceMetrics::empty(dec!(5000));
        assert_eq!(metrics.final_equity, dec!(5000));
        assert_eq!(metrics.total_return_pct, Decimal::ZERO);
        assert!(metrics.sharpe_ratio.is_none());
        assert!(metrics.profit_factor.is_none());
    }

    #[test]
    fn test_summary_renders_missing_ratios() {
        let summary = PerformanceMetrics::empty(dec!(5000)).summary();
        assert!(summary.contains("샤프 비율: N/A"));
        assert!(summary.contains("최종 자산: 5000.00"));
    }
}

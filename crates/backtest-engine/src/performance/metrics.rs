//! 성과 지표 계산 모듈
//!
//! 완료된 실행의 거래 원장과 자산 곡선에서 다음 지표를 계산합니다:
//! - 승률, 프로핏 팩터, 기대값 (매도 거래 기준)
//! - 총 수익과 수익률
//! - 샤프 비율, 소르티노 비율 (자산 곡선의 기간 수익률 기준, 연율화)
//! - 최대 낙폭과 발생 시점
//!
//! 분모가 0이거나 표본이 부족한 비율 지표는 `None`입니다.

use crate::error::{BacktestError, BacktestResult};
use crate::store::BacktestStore;
use backtest_core::{AnalyticsConfig, DecimalExt, EquityCurvePoint, PerformanceMetrics, Trade, HUNDRED};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// 비율 지표의 소수점 자릿수.
const RATIO_DP: u32 = 6;

/// 저장소 기반 성과 분석기.
pub struct PerformanceAnalytics {
    store: Arc<dyn BacktestStore>,
    config: AnalyticsConfig,
}

impl PerformanceAnalytics {
    pub fn new(store: Arc<dyn BacktestStore>, config: AnalyticsConfig) -> Self {
        Self { store, config }
    }

    /// 저장된 거래 원장과 자산 곡선으로 실행의 지표를 계산합니다.
    #[instrument(skip(self))]
    pub async fn calculate_metrics(&self, run_id: Uuid) -> BacktestResult<PerformanceMetrics> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| BacktestError::InvalidState(format!("실행을 찾을 수 없음: {}", run_id)))?;

        let trades = self.store.list_trades(run_id).await?;
        let curve = self.store.list_equity_curve(run_id, None, None).await?;
        debug!(trades = trades.len(), points = curve.len(), "성과 지표 계산");

        Ok(compute_metrics(run.config.initial_cash, &trades, &curve, &self.config))
    }
}

/// 거래 원장과 자산 곡선으로 지표를 계산합니다.
pub fn compute_metrics(
    initial_cash: Decimal,
    trades: &[Trade],
    curve: &[EquityCurvePoint],
    config: &AnalyticsConfig,
) -> PerformanceMetrics {
    let sells: Vec<&Trade> = trades.iter().filter(|t| t.is_sell()).collect();
    let wins: Vec<&Trade> = sells.iter().copied().filter(|t| t.is_win()).collect();
    let losses: Vec<&Trade> = sells.iter().copied().filter(|t| t.is_loss()).collect();

    let total_trades = sells.len() as u32;
    let win_rate = Decimal::from(wins.len())
        .pct_of(Decimal::from(sells.len()))
        .unwrap_or(Decimal::ZERO);

    // 수익
    let (final_equity, final_cash) = curve
        .last()
        .map_or((initial_cash, initial_cash), |p| (p.total_equity, p.cash));
    let total_return = final_equity - initial_cash;
    let total_return_pct = total_return.pct_of(initial_cash).unwrap_or(Decimal::ZERO);

    // 위험 조정 수익
    let returns = period_returns(curve);
    let rf = config.risk_free_per_period();
    let annualization = decimal_sqrt(Decimal::from(config.periods_per_year));
    let sharpe_ratio = sharpe_ratio(&returns, rf, annualization);
    let sortino_ratio = sortino_ratio(&returns, rf, annualization);

    // 낙폭: 금액, 비율, 시점 모두 금액 기준 최저점 하나에서 가져옴
    let trough = curve
        .iter()
        .filter(|p| p.drawdown < Decimal::ZERO)
        .fold(None::<&EquityCurvePoint>, |worst, p| match worst {
            Some(w) if w.drawdown <= p.drawdown => Some(w),
            _ => Some(p),
        });
    let (max_drawdown, max_drawdown_pct, max_drawdown_date) = trough.map_or(
        (Decimal::ZERO, Decimal::ZERO, None),
        |p| (p.drawdown, p.drawdown_pct, Some(p.timestamp)),
    );

    // 거래 품질
    let gross_profit: Decimal = wins.iter().filter_map(|t| t.realized_pl).sum();
    let gross_loss: Decimal = losses.iter().filter_map(|t| t.realized_pl).sum::<Decimal>().abs();
    let profit_factor = if losses.is_empty() {
        None
    } else {
        gross_profit.checked_ratio(gross_loss).map(|pf| pf.round_dp(RATIO_DP))
    };

    let avg_win_pct = mean(wins.iter().filter_map(|t| t.realized_pl_pct)).unwrap_or(Decimal::ZERO);
    let avg_loss_pct = mean(losses.iter().filter_map(|t| t.realized_pl_pct.map(|p| p.abs())))
        .unwrap_or(Decimal::ZERO);
    let win_fraction = win_rate / HUNDRED;
    let expectancy = win_fraction * avg_win_pct - (Decimal::ONE - win_fraction) * avg_loss_pct;

    let largest_win = wins
        .iter()
        .filter_map(|t| t.realized_pl)
        .max()
        .unwrap_or(Decimal::ZERO);
    let largest_loss = losses
        .iter()
        .filter_map(|t| t.realized_pl)
        .min()
        .unwrap_or(Decimal::ZERO);
    let avg_holding_period_days =
        mean(sells.iter().filter_map(|t| t.holding_period_days.map(Decimal::from)));

    PerformanceMetrics {
        total_trades,
        winning_trades: wins.len() as u32,
        losing_trades: losses.len() as u32,
        win_rate,
        final_equity,
        final_cash,
        total_return,
        total_return_pct,
        sharpe_ratio,
        sortino_ratio,
        return_observations: returns.len() as u32,
        max_drawdown,
        max_drawdown_pct,
        max_drawdown_date,
        profit_factor,
        expectancy,
        avg_win_pct,
        avg_loss_pct,
        largest_win,
        largest_loss,
        avg_holding_period_days,
        total_commission: trades.iter().map(|t| t.commission).sum(),
        total_slippage: trades.iter().map(|t| t.slippage_amount).sum(),
    }
}

/// 연속된 자산 스냅샷 사이의 수익률 (비율). 직전 자산이 0 이하인 구간은 제외.
fn period_returns(curve: &[EquityCurvePoint]) -> Vec<Decimal> {
    curve
        .windows(2)
        .filter_map(|w| (w[1].total_equity - w[0].total_equity).checked_ratio(w[0].total_equity))
        .collect()
}

/// 샤프 비율 = 평균 초과 수익률 / 표본 표준편차 × √(연간 기간 수)
///
/// 관측치가 2개 미만이거나 표준편차가 0이면 `None`.
fn sharpe_ratio(returns: &[Decimal], rf: Decimal, annualization: Decimal) -> Option<Decimal> {
    if returns.len() < 2 {
        return None;
    }

    let n = Decimal::from(returns.len());
    let mean_return = returns.iter().copied().sum::<Decimal>() / n;

    // 분산 계산: Σ(ri - mean)² / (n-1)
    let variance = returns
        .iter()
        .map(|r| (*r - mean_return) * (*r - mean_return))
        .sum::<Decimal>()
        / (n - Decimal::ONE);
    let std_dev = decimal_sqrt(variance);

    ((mean_return - rf).checked_ratio(std_dev)).map(|s| (s * annualization).round_dp(RATIO_DP))
}

/// 소르티노 비율 = 평균 초과 수익률 / 하방 편차 × √(연간 기간 수)
///
/// 하방 편차 = √(음수 초과 수익률²의 평균). 음수 초과 수익률이 없으면 `None`.
fn sortino_ratio(returns: &[Decimal], rf: Decimal, annualization: Decimal) -> Option<Decimal> {
    if returns.len() < 2 {
        return None;
    }

    let n = Decimal::from(returns.len());
    let excess: Vec<Decimal> = returns.iter().map(|r| *r - rf).collect();
    let mean_excess = excess.iter().copied().sum::<Decimal>() / n;

    let negatives: Vec<Decimal> = excess.iter().copied().filter(|r| *r < Decimal::ZERO).collect();
    if negatives.is_empty() {
        return None;
    }

    let downside_variance =
        negatives.iter().map(|r| *r * *r).sum::<Decimal>() / Decimal::from(negatives.len());
    let downside_dev = decimal_sqrt(downside_variance);

    mean_excess
        .checked_ratio(downside_dev)
        .map(|s| (s * annualization).round_dp(RATIO_DP))
}

fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, count) = values.fold((Decimal::ZERO, 0u32), |(s, c), v| (s + v, c + 1));
    sum.checked_ratio(Decimal::from(count))
}

/// Decimal 제곱근 (뉴턴 방법, 정밀도 10^-10, 최대 50회 반복).
pub fn decimal_sqrt(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut guess = if value > Decimal::ONE { value / Decimal::TWO } else { Decimal::ONE };
    let precision = Decimal::new(1, 10); // 0.0000000001

    for _ in 0..50 {
        let next_guess = (guess + value / guess) / Decimal::TWO;
        if (next_guess - guess).abs() < precision {
            return next_guess;
        }
        guess = next_guess;
    }

    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_core::Side;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap() + Duration::days(n)
    }

    fn point(n: i64, equity: Decimal, hwm: Decimal) -> EquityCurvePoint {
        let drawdown = equity - hwm;
        EquityCurvePoint {
            timestamp: day(n),
            cash: equity,
            stock_value: Decimal::ZERO,
            total_equity: equity,
            portfolio_high_water_mark: hwm,
            drawdown,
            drawdown_pct: drawdown.pct_of(hwm).unwrap(),
            cumulative_return_pct: Decimal::ZERO,
            trade_count: 0,
        }
    }

    fn sell(pl: Decimal, pl_pct: Decimal, holding: i64) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            run_id: Uuid::nil(),
            sequence: 0,
            symbol: "AAPL".into(),
            side: Side::Sell,
            quantity: dec!(10),
            target_price: dec!(100),
            executed_price: dec!(100),
            slippage_amount: dec!(0.5),
            commission: dec!(1),
            gross_amount: dec!(1000),
            net_amount: dec!(999),
            signal_bar: day(holding),
            execution_bar: day(holding),
            reason: "STRATEGY_EXIT".into(),
            entry_price: Some(dec!(100)),
            realized_pl: Some(pl),
            realized_pl_pct: Some(pl_pct),
            holding_period_days: Some(holding),
        }
    }

    #[test]
    fn test_empty_run_has_null_ratios() {
        let config = AnalyticsConfig::default();
        let curve: Vec<_> = (0..5).map(|n| point(n, dec!(10000), dec!(10000))).collect();
        let metrics = compute_metrics(dec!(10000), &[], &curve, &config);

        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, Decimal::ZERO);
        assert_eq!(metrics.total_return_pct, Decimal::ZERO);
        assert!(metrics.sharpe_ratio.is_none());
        assert!(metrics.sortino_ratio.is_none());
        assert!(metrics.profit_factor.is_none());
        assert!(metrics.max_drawdown_date.is_none());
        assert!(metrics.avg_holding_period_days.is_none());
        assert_eq!(metrics.return_observations, 4);
    }

    #[test]
    fn test_empty_curve_uses_initial_cash() {
        let metrics = compute_metrics(dec!(5000), &[], &[], &AnalyticsConfig::default());
        assert_eq!(metrics.final_equity, dec!(5000));
        assert_eq!(metrics.final_cash, dec!(5000));
        assert_eq!(metrics.return_observations, 0);
    }

    #[test]
    fn test_trade_statistics() {
        let trades = vec![
            sell(dec!(300), dec!(30), 10),
            sell(dec!(100), dec!(10), 4),
            sell(dec!(-200), dec!(-20), 1),
        ];
        let metrics = compute_metrics(dec!(10000), &trades, &[], &AnalyticsConfig::default());

        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.profit_factor, Some(dec!(2)));
        assert_eq!(metrics.avg_win_pct, dec!(20));
        assert_eq!(metrics.avg_loss_pct, dec!(20));
        assert_eq!(metrics.largest_win, dec!(300));
        assert_eq!(metrics.largest_loss, dec!(-200));
        assert_eq!(metrics.avg_holding_period_days, Some(dec!(5)));
        assert_eq!(metrics.total_commission, dec!(3));
        assert_eq!(metrics.total_slippage, dec!(1.5));
        // 승률 2/3: 2/3 × 20 - 1/3 × 20 ≈ 6.67
        assert!(metrics.expectancy.approx_eq(dec!(6.6666666667), dec!(0.000001)));
    }

    #[test]
    fn test_no_losses_means_no_profit_factor() {
        let trades = vec![sell(dec!(50), dec!(5), 2)];
        let metrics = compute_metrics(dec!(10000), &trades, &[], &AnalyticsConfig::default());
        assert_eq!(metrics.win_rate, dec!(100));
        assert!(metrics.profit_factor.is_none());
        assert_eq!(metrics.expectancy, dec!(5));
    }

    #[test]
    fn test_max_drawdown_and_date() {
        let curve = vec![
            point(0, dec!(10000), dec!(10000)),
            point(1, dec!(11000), dec!(11000)),
            point(2, dec!(9900), dec!(11000)),
            point(3, dec!(10500), dec!(11000)),
        ];
        let metrics = compute_metrics(dec!(10000), &[], &curve, &AnalyticsConfig::default());

        assert_eq!(metrics.max_drawdown, dec!(-1100));
        assert_eq!(metrics.max_drawdown_pct, dec!(-10));
        assert_eq!(metrics.max_drawdown_date, Some(day(2)));
        assert_eq!(metrics.final_equity, dec!(10500));
        assert_eq!(metrics.total_return_pct, dec!(5));
    }

    #[test]
    fn test_drawdown_fields_come_from_same_point() {
        // 첫 낙폭: -1000 / 10000 = -10%
        // 새 최고치 후 낙폭: -1500 / 20000 = -7.5% (금액은 더 크고 비율은 더 작음)
        let curve = vec![
            point(0, dec!(10000), dec!(10000)),
            point(1, dec!(9000), dec!(10000)),
            point(2, dec!(20000), dec!(20000)),
            point(3, dec!(18500), dec!(20000)),
        ];
        let metrics = compute_metrics(dec!(10000), &[], &curve, &AnalyticsConfig::default());

        assert_eq!(metrics.max_drawdown, dec!(-1500));
        assert_eq!(metrics.max_drawdown_pct, dec!(-7.5));
        assert_eq!(metrics.max_drawdown_date, Some(day(3)));
    }

    #[test]
    fn test_sharpe_and_sortino() {
        let curve = vec![
            point(0, dec!(10000), dec!(10000)),
            point(1, dec!(10100), dec!(10100)),
            point(2, dec!(10000), dec!(10100)),
            point(3, dec!(10200), dec!(10200)),
        ];
        let metrics = compute_metrics(dec!(10000), &[], &curve, &AnalyticsConfig::default());

        let sharpe = metrics.sharpe_ratio.unwrap();
        let sortino = metrics.sortino_ratio.unwrap();
        assert!(sharpe > Decimal::ZERO);
        // 하방 편차만 쓰므로 소르티노가 더 큼
        assert!(sortino > sharpe);
        assert_eq!(metrics.return_observations, 3);
    }

    #[test]
    fn test_single_observation_is_null() {
        let curve = vec![
            point(0, dec!(10000), dec!(10000)),
            point(1, dec!(10100), dec!(10100)),
        ];
        let metrics = compute_metrics(dec!(10000), &[], &curve, &AnalyticsConfig::default());
        assert_eq!(metrics.return_observations, 1);
        assert!(metrics.sharpe_ratio.is_none());
        assert!(metrics.sortino_ratio.is_none());
    }

    #[test]
    fn test_decimal_sqrt() {
        assert!(decimal_sqrt(dec!(252)).approx_eq(dec!(15.874507866), dec!(0.000001)));
        assert!(decimal_sqrt(dec!(0.0004)).approx_eq(dec!(0.02), dec!(0.0000001)));
        assert_eq!(decimal_sqrt(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(decimal_sqrt(dec!(-4)), Decimal::ZERO);
    }
}

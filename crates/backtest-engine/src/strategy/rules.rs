//! 참조 평가기.

use super::{SignalContext, SignalEvaluator};
use crate::error::BacktestResult;
use async_trait::async_trait;
use backtest_core::{HistoricalBar, Percentage};
use rust_decimal::Decimal;

/// 일정 간격으로 진입하고 보유 기간 또는 손익률로 청산하는 평가기.
///
/// 보유 기간은 윈도우 안에서 진입 바 이후의 바 수로 세므로 `hold_bars`는
/// 트레일링 윈도우보다 작아야 합니다.
#[derive(Debug, Clone)]
pub struct ScheduledEntryExit {
    /// 첫 진입 바 순번
    first_entry: usize,
    /// 진입 간격 (바)
    entry_every: usize,
    /// 보유 바 수
    hold_bars: usize,
    /// 익절 기준 (%)
    take_profit_pct: Option<Percentage>,
    /// 손절 기준 (%, 양수)
    stop_loss_pct: Option<Percentage>,
}

impl ScheduledEntryExit {
    pub fn new(entry_every: usize, hold_bars: usize) -> Self {
        Self {
            first_entry: 0,
            entry_every: entry_every.max(1),
            hold_bars: hold_bars.max(1),
            take_profit_pct: None,
            stop_loss_pct: None,
        }
    }

    /// 첫 진입 바 설정
    pub fn with_first_entry(mut self, bar_index: usize) -> Self {
        self.first_entry = bar_index;
        self
    }

    /// 익절 기준 설정
    pub fn with_take_profit(mut self, pct: Percentage) -> Self {
        self.take_profit_pct = Some(pct);
        self
    }

    /// 손절 기준 설정
    pub fn with_stop_loss(mut self, pct: Percentage) -> Self {
        self.stop_loss_pct = Some(pct.abs());
        self
    }
}

#[async_trait]
impl SignalEvaluator for ScheduledEntryExit {
    fn name(&self) -> &str {
        "Scheduled Entry/Exit"
    }

    async fn evaluate(&self, ctx: &SignalContext<'_>) -> BacktestResult<bool> {
        let Some(position) = ctx.position else {
            return Ok(ctx.bar_index >= self.first_entry
                && (ctx.bar_index - self.first_entry) % self.entry_every == 0);
        };

        if self
            .take_profit_pct
            .is_some_and(|tp| position.unrealized_pl_pct >= tp)
        {
            return Ok(true);
        }
        if self
            .stop_loss_pct
            .is_some_and(|sl| position.unrealized_pl_pct <= -sl)
        {
            return Ok(true);
        }

        let held = ctx
            .window
            .iter()
            .filter(|b| b.timestamp > position.entry_bar && b.timestamp <= ctx.bar.timestamp)
            .count();
        Ok(held >= self.hold_bars)
    }
}

/// 단순 이동평균 크로스오버 평가기.
///
/// 단기 SMA가 장기 SMA를 상향 돌파하면 진입, 하향 돌파하면 청산합니다.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    short_period: usize,
    long_period: usize,
}

impl SmaCrossover {
    pub fn new(short_period: usize, long_period: usize) -> Self {
        let short_period = short_period.max(1);
        Self {
            short_period,
            long_period: long_period.max(short_period + 1),
        }
    }

    /// 필요한 최소 윈도우 크기 (직전 바 비교 포함)
    pub fn required_window(&self) -> usize {
        self.long_period + 1
    }
}

/// 마지막 `period`개 종가의 평균.
fn calculate_sma(bars: &[HistoricalBar], period: usize) -> Option<Decimal> {
    if bars.len() < period || period == 0 {
        return None;
    }

    let sum: Decimal = bars[bars.len() - period..].iter().map(|b| b.close).sum();
    Some(sum / Decimal::from(period))
}

#[async_trait]
impl SignalEvaluator for SmaCrossover {
    fn name(&self) -> &str {
        "SMA Crossover"
    }

    async fn evaluate(&self, ctx: &SignalContext<'_>) -> BacktestResult<bool> {
        let window = ctx.window;
        if window.len() < self.required_window() {
            return Ok(false);
        }

        let previous = &window[..window.len() - 1];
        let (Some(short), Some(long), Some(prev_short), Some(prev_long)) = (
            calculate_sma(window, self.short_period),
            calculate_sma(window, self.long_period),
            calculate_sma(previous, self.short_period),
            calculate_sma(previous, self.long_period),
        ) else {
            return Ok(false);
        };

        if ctx.is_exit() {
            // 데드 크로스
            Ok(prev_short >= prev_long && short < long)
        } else {
            // 골든 크로스
            Ok(prev_short <= prev_long && short > long)
        }
    }
}

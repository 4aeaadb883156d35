//! 가상 포트폴리오 엔진.
//!
//! 실행 하나가 엔진 인스턴스 하나를 소유합니다. 현금, 심볼별 포지션,
//! 거래 원장, 자산 곡선 버퍼를 관리하며 모든 변경은 `&mut self`를 통해
//! 순차적으로 이루어집니다.
//!
//! 거래와 포지션은 체결 즉시 저장소에 기록하고, 자산 곡선은 메모리에
//! 모았다가 [`VirtualPortfolioEngine::finalize_equity_curve`]에서 한 번에
//! 저장합니다.

use super::diagnostics::{OrderDiagnostic, OrderOutcome};
use crate::error::{BacktestError, BacktestResult};
use crate::store::BacktestStore;
use crate::telemetry;
use backtest_core::{
    DecimalExt, EquityCurvePoint, Position, Price, Quantity, Side, Trade,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// 실행 단위 가상 포트폴리오.
pub struct VirtualPortfolioEngine {
    /// 실행 ID
    run_id: Uuid,

    /// 저장소
    store: Arc<dyn BacktestStore>,

    /// 초기 현금
    initial_cash: Decimal,

    /// 현재 현금
    cash: Decimal,

    /// 슬리피지 (bp)
    slippage_bps: Decimal,

    /// 거래당 고정 수수료
    commission_per_trade: Decimal,

    /// 심볼별 포지션 (닫힌 포지션 포함)
    positions: HashMap<String, Position>,

    /// 거래 원장
    trades: Vec<Trade>,

    /// 저장 전 자산 곡선 버퍼
    equity_curve: Vec<EquityCurvePoint>,

    /// 총 자산 최고치
    portfolio_high_water_mark: Decimal,

    /// 건너뛴 주문 진단
    diagnostics: Vec<OrderDiagnostic>,

    /// 포지션 종료 판정 허용 오차
    quantity_epsilon: Decimal,

    /// 자산 곡선 저장 완료 여부
    finalized: bool,
}

impl VirtualPortfolioEngine {
    /// 새 엔진을 생성합니다. 사용 전에 [`initialize`](Self::initialize)를 호출하세요.
    pub fn new(run_id: Uuid, store: Arc<dyn BacktestStore>) -> Self {
        Self {
            run_id,
            store,
            initial_cash: Decimal::ZERO,
            cash: Decimal::ZERO,
            slippage_bps: Decimal::ZERO,
            commission_per_trade: Decimal::ZERO,
            positions: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            portfolio_high_water_mark: Decimal::ZERO,
            diagnostics: Vec::new(),
            quantity_epsilon: dec!(0.00000001),
            finalized: false,
        }
    }

    /// 포지션 종료 판정 허용 오차 설정
    pub fn with_quantity_epsilon(mut self, epsilon: Decimal) -> Self {
        self.quantity_epsilon = epsilon;
        self
    }

    /// 현금, 포지션, 원장, 자산 곡선 버퍼를 초기화합니다.
    pub fn initialize(
        &mut self,
        initial_cash: Decimal,
        slippage_bps: Decimal,
        commission_per_trade: Decimal,
    ) -> BacktestResult<()> {
        if initial_cash <= Decimal::ZERO {
            return Err(BacktestError::InvalidConfig(format!(
                "초기 현금은 0보다 커야 합니다: {}",
                initial_cash
            )));
        }
        if slippage_bps < Decimal::ZERO || commission_per_trade < Decimal::ZERO {
            return Err(BacktestError::InvalidConfig(
                "슬리피지와 수수료는 음수일 수 없습니다".into(),
            ));
        }

        self.initial_cash = initial_cash;
        self.cash = initial_cash;
        self.slippage_bps = slippage_bps;
        self.commission_per_trade = commission_per_trade;
        self.positions.clear();
        self.trades.clear();
        self.equity_curve.clear();
        self.diagnostics.clear();
        self.portfolio_high_water_mark = initial_cash;
        self.finalized = false;

        debug!(
            run_id = %self.run_id,
            initial_cash = %initial_cash,
            slippage_bps = %slippage_bps,
            commission = %commission_per_trade,
            "포트폴리오 초기화"
        );
        Ok(())
    }

    /// 매수 주문을 체결합니다.
    ///
    /// 순 매수 금액이 현금을 초과하면 상태를 바꾸지 않고
    /// `OrderOutcome::Skipped`를 반환합니다.
    pub async fn execute_buy_order(
        &mut self,
        symbol: &str,
        quantity: Quantity,
        target_price: Price,
        signal_bar: DateTime<Utc>,
        execution_bar: DateTime<Utc>,
        reason: &str,
    ) -> BacktestResult<OrderOutcome> {
        if let Some(diagnostic) = validate_order(symbol, quantity, target_price, execution_bar) {
            return Ok(self.skip(diagnostic));
        }

        // 매수는 높은 가격에 체결
        let executed_price = target_price * (Decimal::ONE + self.slippage_bps.bps_to_ratio());
        let gross_amount = quantity * executed_price;
        let net_cost = gross_amount + self.commission_per_trade;

        if net_cost > self.cash {
            return Ok(self.skip(OrderDiagnostic::InsufficientFunds {
                symbol: symbol.to_string(),
                required: net_cost,
                available: self.cash,
                bar: execution_bar,
            }));
        }

        self.cash -= net_cost;

        let position = match self.positions.get_mut(symbol).filter(|p| p.is_open) {
            Some(position) => {
                position.add(quantity, net_cost, target_price, execution_bar);
                position.clone()
            }
            None => {
                // 닫힌 포지션은 새 포지션으로 교체
                let position =
                    Position::open(symbol, quantity, net_cost, target_price, execution_bar);
                self.positions.insert(symbol.to_string(), position.clone());
                position
            }
        };

        let trade = Trade {
            id: Uuid::new_v4(),
            run_id: self.run_id,
            sequence: self.trades.len() as u32,
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity,
            target_price,
            executed_price,
            slippage_amount: (executed_price - target_price).abs() * quantity,
            commission: self.commission_per_trade,
            gross_amount,
            net_amount: net_cost,
            signal_bar,
            execution_bar,
            reason: reason.to_string(),
            entry_price: None,
            realized_pl: None,
            realized_pl_pct: None,
            holding_period_days: None,
        };

        self.record_trade(&trade, &position).await?;
        debug!(
            symbol = symbol,
            quantity = %quantity,
            price = %executed_price,
            cash = %self.cash,
            "매수 체결"
        );
        Ok(OrderOutcome::Executed(trade))
    }

    /// 매도 주문을 체결합니다.
    ///
    /// 오픈 포지션이 없으면 `OrderOutcome::Skipped`를 반환합니다. 보유
    /// 수량보다 많이 매도하면 보유 수량만큼만 체결합니다.
    pub async fn execute_sell_order(
        &mut self,
        symbol: &str,
        quantity: Quantity,
        target_price: Price,
        signal_bar: DateTime<Utc>,
        execution_bar: DateTime<Utc>,
        reason: &str,
    ) -> BacktestResult<OrderOutcome> {
        if let Some(diagnostic) = validate_order(symbol, quantity, target_price, execution_bar) {
            return Ok(self.skip(diagnostic));
        }

        let Some(position) = self.positions.get_mut(symbol).filter(|p| p.is_open) else {
            return Ok(self.skip(OrderDiagnostic::NoOpenPosition {
                symbol: symbol.to_string(),
                bar: execution_bar,
            }));
        };

        let quantity = quantity.min(position.quantity);

        // 매도는 낮은 가격에 체결
        let executed_price = target_price * (Decimal::ONE - self.slippage_bps.bps_to_ratio());
        let gross_amount = quantity * executed_price;
        let net_proceeds = gross_amount - self.commission_per_trade;

        let entry_price = position.avg_entry_price;
        let entry_bar = position.entry_bar;
        let cost_basis = position.reduce(quantity, self.quantity_epsilon, execution_bar);
        let realized_pl = net_proceeds - cost_basis;
        let realized_pl_pct = realized_pl.pct_of(cost_basis).unwrap_or(Decimal::ZERO);
        let position = position.clone();

        self.cash += net_proceeds;

        let trade = Trade {
            id: Uuid::new_v4(),
            run_id: self.run_id,
            sequence: self.trades.len() as u32,
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity,
            target_price,
            executed_price,
            slippage_amount: (target_price - executed_price).abs() * quantity,
            commission: self.commission_per_trade,
            gross_amount,
            net_amount: net_proceeds,
            signal_bar,
            execution_bar,
            reason: reason.to_string(),
            entry_price: Some(entry_price),
            realized_pl: Some(realized_pl),
            realized_pl_pct: Some(realized_pl_pct),
            holding_period_days: Some((execution_bar - entry_bar).num_days()),
        };

        self.record_trade(&trade, &position).await?;
        debug!(
            symbol = symbol,
            quantity = %quantity,
            price = %executed_price,
            realized_pl = %realized_pl,
            closed = !position.is_open,
            "매도 체결"
        );
        Ok(OrderOutcome::Executed(trade))
    }

    /// 오픈 포지션을 시가 평가합니다. 오픈 포지션이 없으면 `false`.
    pub fn update_current_price(&mut self, symbol: &str, price: Price, at: DateTime<Utc>) -> bool {
        match self.positions.get_mut(symbol) {
            Some(position) => position.mark(price, at),
            None => false,
        }
    }

    /// 현재 바의 자산 스냅샷을 버퍼에 추가합니다.
    pub fn record_equity_curve_snapshot(&mut self, at: DateTime<Utc>) -> &EquityCurvePoint {
        let stock_value: Decimal = self.positions.values().map(Position::open_market_value).sum();
        let total_equity = self.cash + stock_value;

        self.portfolio_high_water_mark = self.portfolio_high_water_mark.max(total_equity);
        let drawdown = total_equity - self.portfolio_high_water_mark;

        let point = EquityCurvePoint {
            timestamp: at,
            cash: self.cash,
            stock_value,
            total_equity,
            portfolio_high_water_mark: self.portfolio_high_water_mark,
            drawdown,
            drawdown_pct: drawdown
                .pct_of(self.portfolio_high_water_mark)
                .unwrap_or(Decimal::ZERO),
            cumulative_return_pct: (total_equity - self.initial_cash)
                .pct_of(self.initial_cash)
                .unwrap_or(Decimal::ZERO),
            trade_count: self.trades.len() as u32,
        };
        trace!(timestamp = %at, equity = %total_equity, "자산 스냅샷");

        self.equity_curve.push(point);
        &self.equity_curve[self.equity_curve.len() - 1]
    }

    /// 버퍼의 자산 곡선을 한 번에 저장합니다.
    ///
    /// 두 번째 호출은 `AlreadyFinalized`를 반환합니다. 저장이 실패하면
    /// 버퍼는 그대로 남습니다.
    pub async fn finalize_equity_curve(&mut self) -> BacktestResult<usize> {
        if self.finalized {
            return Err(BacktestError::AlreadyFinalized);
        }

        let inserted = self
            .store
            .insert_equity_points(self.run_id, &self.equity_curve)
            .await?;
        self.finalized = true;

        debug!(run_id = %self.run_id, points = inserted, "자산 곡선 저장 완료");
        Ok(inserted)
    }

    /// 모든 포지션의 최종 상태를 저장합니다.
    pub async fn persist_positions(&self) -> BacktestResult<()> {
        for position in self.positions.values() {
            self.store.upsert_position(self.run_id, position).await?;
        }
        Ok(())
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn initial_cash(&self) -> Decimal {
        self.initial_cash
    }

    /// 현재 현금
    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// 닫힌 포지션을 포함한 모든 포지션
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// 심볼의 오픈 포지션
    pub fn open_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| p.is_open)
    }

    /// 거래 원장
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// 저장 전 자산 곡선 버퍼
    pub fn equity_curve(&self) -> &[EquityCurvePoint] {
        &self.equity_curve
    }

    /// 건너뛴 주문 진단
    pub fn diagnostics(&self) -> &[OrderDiagnostic] {
        &self.diagnostics
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    async fn record_trade(&mut self, trade: &Trade, position: &Position) -> BacktestResult<()> {
        self.store.insert_trade(trade).await?;
        self.store.upsert_position(self.run_id, position).await?;
        self.trades.push(trade.clone());
        telemetry::record_order_executed(trade.side.as_str());
        Ok(())
    }

    fn skip(&mut self, diagnostic: OrderDiagnostic) -> OrderOutcome {
        warn!(
            run_id = %self.run_id,
            symbol = diagnostic.symbol(),
            reason = diagnostic.kind(),
            "주문 건너뜀: {}",
            diagnostic
        );
        telemetry::record_order_skipped(diagnostic.kind());
        self.diagnostics.push(diagnostic.clone());
        OrderOutcome::Skipped(diagnostic)
    }
}

fn validate_order(
    symbol: &str,
    quantity: Quantity,
    price: Price,
    bar: DateTime<Utc>,
) -> Option<OrderDiagnostic> {
    if quantity <= Decimal::ZERO {
        return Some(OrderDiagnostic::InvalidQuantity {
            symbol: symbol.to_string(),
            quantity,
            bar,
        });
    }
    if price <= Decimal::ZERO {
        return Some(OrderDiagnostic::InvalidPrice {
            symbol: symbol.to_string(),
            price,
            bar,
        });
    }
    None
}

//! PostgreSQL 저장소.
//!
//! 스키마는 `migrations/0001_backtest.sql`을 참고하세요. 성과 지표는
//! JSONB 컬럼에 저장합니다.

use super::BacktestStore;
use crate::error::{BacktestError, BacktestResult};
use async_trait::async_trait;
use backtest_core::{
    BacktestRun, BacktestRunConfig, EquityCurvePoint, PerformanceMetrics, Position, Trade,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, instrument};
use uuid::Uuid;

// ==================== DB 레코드 ====================

#[derive(Debug, Clone, FromRow)]
struct RunRow {
    id: Uuid,
    strategy_id: String,
    symbol: String,
    time_horizon: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    initial_cash: Decimal,
    position_sizing: String,
    position_size: Decimal,
    slippage_bps: Decimal,
    commission_per_trade: Decimal,
    status: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    execution_time_ms: Option<i64>,
    error_message: Option<String>,
    metrics: Option<serde_json::Value>,
}

impl TryFrom<RunRow> for BacktestRun {
    type Error = BacktestError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let metrics = row
            .metrics
            .map(serde_json::from_value::<PerformanceMetrics>)
            .transpose()?;

        Ok(BacktestRun {
            id: row.id,
            config: BacktestRunConfig {
                strategy_id: row.strategy_id,
                symbol: row.symbol,
                time_horizon: row.time_horizon.parse()?,
                start_date: row.start_date,
                end_date: row.end_date,
                initial_cash: row.initial_cash,
                position_sizing: row.position_sizing.parse()?,
                position_size: row.position_size,
                slippage_bps: row.slippage_bps,
                commission_per_trade: row.commission_per_trade,
            },
            status: row.status.parse()?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            execution_time_ms: row.execution_time_ms.map(|ms| ms.max(0) as u64),
            error_message: row.error_message,
            metrics,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct PositionRow {
    symbol: String,
    quantity: Decimal,
    avg_entry_price: Decimal,
    total_cost: Decimal,
    current_price: Decimal,
    market_value: Decimal,
    unrealized_pl: Decimal,
    unrealized_pl_pct: Decimal,
    high_water_mark: Decimal,
    max_drawdown_pct: Decimal,
    entry_bar: DateTime<Utc>,
    last_update_bar: DateTime<Utc>,
    is_open: bool,
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Position {
            symbol: row.symbol,
            quantity: row.quantity,
            avg_entry_price: row.avg_entry_price,
            total_cost: row.total_cost,
            current_price: row.current_price,
            market_value: row.market_value,
            unrealized_pl: row.unrealized_pl,
            unrealized_pl_pct: row.unrealized_pl_pct,
            high_water_mark: row.high_water_mark,
            max_drawdown_pct: row.max_drawdown_pct,
            entry_bar: row.entry_bar,
            last_update_bar: row.last_update_bar,
            is_open: row.is_open,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct TradeRow {
    id: Uuid,
    run_id: Uuid,
    sequence: i32,
    symbol: String,
    side: String,
    quantity: Decimal,
    target_price: Decimal,
    executed_price: Decimal,
    slippage_amount: Decimal,
    commission: Decimal,
    gross_amount: Decimal,
    net_amount: Decimal,
    signal_bar: DateTime<Utc>,
    execution_bar: DateTime<Utc>,
    reason: String,
    entry_price: Option<Decimal>,
    realized_pl: Option<Decimal>,
    realized_pl_pct: Option<Decimal>,
    holding_period_days: Option<i64>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = BacktestError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(Trade {
            id: row.id,
            run_id: row.run_id,
            sequence: row.sequence.max(0) as u32,
            symbol: row.symbol,
            side: row.side.parse()?,
            quantity: row.quantity,
            target_price: row.target_price,
            executed_price: row.executed_price,
            slippage_amount: row.slippage_amount,
            commission: row.commission,
            gross_amount: row.gross_amount,
            net_amount: row.net_amount,
            signal_bar: row.signal_bar,
            execution_bar: row.execution_bar,
            reason: row.reason,
            entry_price: row.entry_price,
            realized_pl: row.realized_pl,
            realized_pl_pct: row.realized_pl_pct,
            holding_period_days: row.holding_period_days,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct EquityRow {
    timestamp: DateTime<Utc>,
    cash: Decimal,
    stock_value: Decimal,
    total_equity: Decimal,
    portfolio_high_water_mark: Decimal,
    drawdown: Decimal,
    drawdown_pct: Decimal,
    cumulative_return_pct: Decimal,
    trade_count: i32,
}

impl From<EquityRow> for EquityCurvePoint {
    fn from(row: EquityRow) -> Self {
        EquityCurvePoint {
            timestamp: row.timestamp,
            cash: row.cash,
            stock_value: row.stock_value,
            total_equity: row.total_equity,
            portfolio_high_water_mark: row.portfolio_high_water_mark,
            drawdown: row.drawdown,
            drawdown_pct: row.drawdown_pct,
            cumulative_return_pct: row.cumulative_return_pct,
            trade_count: row.trade_count.max(0) as u32,
        }
    }
}

// ==================== 저장소 ====================

/// PostgreSQL 기반 백테스트 저장소.
#[derive(Debug, Clone)]
pub struct PgBacktestStore {
    pool: PgPool,
}

impl PgBacktestStore {
    /// 기존 연결 풀로 저장소를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BacktestStore for PgBacktestStore {
    async fn create_run(&self, run: &BacktestRun) -> BacktestResult<()> {
        debug!(run_id = %run.id, strategy_id = %run.config.strategy_id, "백테스트 실행 저장");
        let c = &run.config;

        sqlx::query(
            r#"
            INSERT INTO backtest_runs (
                id, strategy_id, symbol, time_horizon, start_date, end_date,
                initial_cash, position_sizing, position_size, slippage_bps,
                commission_per_trade, status, started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(run.id)
        .bind(&c.strategy_id)
        .bind(&c.symbol)
        .bind(c.time_horizon.as_str())
        .bind(c.start_date)
        .bind(c.end_date)
        .bind(c.initial_cash)
        .bind(c.position_sizing.as_str())
        .bind(c.position_size)
        .bind(c.slippage_bps)
        .bind(c.commission_per_trade)
        .bind(run.status.as_str())
        .bind(run.started_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_run(&self, run: &BacktestRun) -> BacktestResult<()> {
        let metrics = run.metrics.as_ref().map(serde_json::to_value).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE backtest_runs
            SET status = $2, finished_at = $3, execution_time_ms = $4,
                error_message = $5, metrics = $6
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.status.as_str())
        .bind(run.finished_at)
        .bind(run.execution_time_ms.map(|ms| ms as i64))
        .bind(&run.error_message)
        .bind(metrics)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BacktestError::Persistence(format!("실행을 찾을 수 없음: {}", run.id)));
        }
        info!(run_id = %run.id, status = %run.status, "백테스트 실행 상태 갱신");
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> BacktestResult<Option<BacktestRun>> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, strategy_id, symbol, time_horizon, start_date, end_date,
                   initial_cash, position_sizing, position_size, slippage_bps,
                   commission_per_trade, status, started_at, finished_at,
                   execution_time_ms, error_message, metrics
            FROM backtest_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BacktestRun::try_from).transpose()
    }

    async fn delete_run(&self, run_id: Uuid) -> BacktestResult<()> {
        // 하위 테이블은 ON DELETE CASCADE
        sqlx::query("DELETE FROM backtest_runs WHERE id = $1")
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_position(&self, run_id: Uuid, p: &Position) -> BacktestResult<()> {
        sqlx::query(
            r#"
            INSERT INTO backtest_positions (
                run_id, symbol, quantity, avg_entry_price, total_cost, current_price,
                market_value, unrealized_pl, unrealized_pl_pct, high_water_mark,
                max_drawdown_pct, entry_bar, last_update_bar, is_open
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (run_id, symbol) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                avg_entry_price = EXCLUDED.avg_entry_price,
                total_cost = EXCLUDED.total_cost,
                current_price = EXCLUDED.current_price,
                market_value = EXCLUDED.market_value,
                unrealized_pl = EXCLUDED.unrealized_pl,
                unrealized_pl_pct = EXCLUDED.unrealized_pl_pct,
                high_water_mark = EXCLUDED.high_water_mark,
                max_drawdown_pct = EXCLUDED.max_drawdown_pct,
                entry_bar = EXCLUDED.entry_bar,
                last_update_bar = EXCLUDED.last_update_bar,
                is_open = EXCLUDED.is_open
            "#,
        )
        .bind(run_id)
        .bind(&p.symbol)
        .bind(p.quantity)
        .bind(p.avg_entry_price)
        .bind(p.total_cost)
        .bind(p.current_price)
        .bind(p.market_value)
        .bind(p.unrealized_pl)
        .bind(p.unrealized_pl_pct)
        .bind(p.high_water_mark)
        .bind(p.max_drawdown_pct)
        .bind(p.entry_bar)
        .bind(p.last_update_bar)
        .bind(p.is_open)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_positions(&self, run_id: Uuid) -> BacktestResult<Vec<Position>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT symbol, quantity, avg_entry_price, total_cost, current_price,
                   market_value, unrealized_pl, unrealized_pl_pct, high_water_mark,
                   max_drawdown_pct, entry_bar, last_update_bar, is_open
            FROM backtest_positions
            WHERE run_id = $1
            ORDER BY symbol ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Position::from).collect())
    }

    async fn insert_trade(&self, t: &Trade) -> BacktestResult<()> {
        sqlx::query(
            r#"
            INSERT INTO backtest_trades (
                id, run_id, sequence, symbol, side, quantity, target_price,
                executed_price, slippage_amount, commission, gross_amount, net_amount,
                signal_bar, execution_bar, reason, entry_price, realized_pl,
                realized_pl_pct, holding_period_days
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(t.id)
        .bind(t.run_id)
        .bind(t.sequence as i32)
        .bind(&t.symbol)
        .bind(t.side.as_str())
        .bind(t.quantity)
        .bind(t.target_price)
        .bind(t.executed_price)
        .bind(t.slippage_amount)
        .bind(t.commission)
        .bind(t.gross_amount)
        .bind(t.net_amount)
        .bind(t.signal_bar)
        .bind(t.execution_bar)
        .bind(&t.reason)
        .bind(t.entry_price)
        .bind(t.realized_pl)
        .bind(t.realized_pl_pct)
        .bind(t.holding_period_days)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_trades(&self, run_id: Uuid) -> BacktestResult<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT id, run_id, sequence, symbol, side, quantity, target_price,
                   executed_price, slippage_amount, commission, gross_amount, net_amount,
                   signal_bar, execution_bar, reason, entry_price, realized_pl,
                   realized_pl_pct, holding_period_days
            FROM backtest_trades
            WHERE run_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    #[instrument(skip(self, points), fields(count = points.len()))]
    async fn insert_equity_points(
        &self,
        run_id: Uuid,
        points: &[EquityCurvePoint],
    ) -> BacktestResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        // 각 컬럼에 대한 배열 생성
        let run_ids: Vec<Uuid> = points.iter().map(|_| run_id).collect();
        let timestamps: Vec<DateTime<Utc>> = points.iter().map(|p| p.timestamp).collect();
        let cash: Vec<Decimal> = points.iter().map(|p| p.cash).collect();
        let stock_values: Vec<Decimal> = points.iter().map(|p| p.stock_value).collect();
        let total_equities: Vec<Decimal> = points.iter().map(|p| p.total_equity).collect();
        let high_water_marks: Vec<Decimal> =
            points.iter().map(|p| p.portfolio_high_water_mark).collect();
        let drawdowns: Vec<Decimal> = points.iter().map(|p| p.drawdown).collect();
        let drawdown_pcts: Vec<Decimal> = points.iter().map(|p| p.drawdown_pct).collect();
        let cumulative_returns: Vec<Decimal> =
            points.iter().map(|p| p.cumulative_return_pct).collect();
        let trade_counts: Vec<i32> = points.iter().map(|p| p.trade_count as i32).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO backtest_equity_curve (
                run_id, timestamp, cash, stock_value, total_equity,
                portfolio_high_water_mark, drawdown, drawdown_pct,
                cumulative_return_pct, trade_count
            )
            SELECT * FROM UNNEST(
                $1::uuid[], $2::timestamptz[], $3::numeric[], $4::numeric[], $5::numeric[],
                $6::numeric[], $7::numeric[], $8::numeric[], $9::numeric[], $10::int4[]
            )
            "#,
        )
        .bind(&run_ids)
        .bind(&timestamps)
        .bind(&cash)
        .bind(&stock_values)
        .bind(&total_equities)
        .bind(&high_water_marks)
        .bind(&drawdowns)
        .bind(&drawdown_pcts)
        .bind(&cumulative_returns)
        .bind(&trade_counts)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() as usize;
        info!(run_id = %run_id, inserted = inserted, "자산 곡선 일괄 저장");
        Ok(inserted)
    }

    async fn list_equity_curve(
        &self,
        run_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> BacktestResult<Vec<EquityCurvePoint>> {
        let rows = sqlx::query_as::<_, EquityRow>(
            r#"
            SELECT timestamp, cash, stock_value, total_equity, portfolio_high_water_mark,
                   drawdown, drawdown_pct, cumulative_return_pct, trade_count
            FROM backtest_equity_curve
            WHERE run_id = $1
              AND ($2::timestamptz IS NULL OR timestamp >= $2)
              AND ($3::timestamptz IS NULL OR timestamp <= $3)
            ORDER BY timestamp ASC
            "#,
        )
        .bind(run_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EquityCurvePoint::from).collect())
    }
}

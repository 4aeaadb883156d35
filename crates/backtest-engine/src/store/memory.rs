//! 메모리 기반 저장소.

use super::BacktestStore;
use crate::error::{BacktestError, BacktestResult};
use async_trait::async_trait;
use backtest_core::{BacktestRun, EquityCurvePoint, Position, Trade};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug)]
struct RunRecord {
    run: BacktestRun,
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityCurvePoint>,
}

/// 프로세스 내 저장소.
#[derive(Debug, Default)]
pub struct InMemoryBacktestStore {
    runs: RwLock<HashMap<Uuid, RunRecord>>,
}

impl InMemoryBacktestStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 실행 수.
    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }

    /// 저장된 모든 실행 (시작 시각 순).
    pub async fn runs(&self) -> Vec<BacktestRun> {
        let mut runs: Vec<BacktestRun> =
            self.runs.read().await.values().map(|r| r.run.clone()).collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }
}

fn missing(run_id: Uuid) -> BacktestError {
    BacktestError::Persistence(format!("실행을 찾을 수 없음: {}", run_id))
}

#[async_trait]
impl BacktestStore for InMemoryBacktestStore {
    async fn create_run(&self, run: &BacktestRun) -> BacktestResult<()> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(BacktestError::Persistence(format!("중복 실행 ID: {}", run.id)));
        }
        runs.insert(
            run.id,
            RunRecord {
                run: run.clone(),
                positions: BTreeMap::new(),
                trades: Vec::new(),
                equity_curve: Vec::new(),
            },
        );
        Ok(())
    }

    async fn update_run(&self, run: &BacktestRun) -> BacktestResult<()> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(&run.id).ok_or_else(|| missing(run.id))?;
        record.run = run.clone();
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> BacktestResult<Option<BacktestRun>> {
        Ok(self.runs.read().await.get(&run_id).map(|r| r.run.clone()))
    }

    async fn delete_run(&self, run_id: Uuid) -> BacktestResult<()> {
        self.runs.write().await.remove(&run_id);
        Ok(())
    }

    async fn upsert_position(&self, run_id: Uuid, position: &Position) -> BacktestResult<()> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(&run_id).ok_or_else(|| missing(run_id))?;
        record.positions.insert(position.symbol.clone(), position.clone());
        Ok(())
    }

    async fn list_positions(&self, run_id: Uuid) -> BacktestResult<Vec<Position>> {
        let runs = self.runs.read().await;
        Ok(runs
            .get(&run_id)
            .map(|r| r.positions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_trade(&self, trade: &Trade) -> BacktestResult<()> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(&trade.run_id).ok_or_else(|| missing(trade.run_id))?;
        record.trades.push(trade.clone());
        Ok(())
    }

    async fn list_trades(&self, run_id: Uuid) -> BacktestResult<Vec<Trade>> {
        let runs = self.runs.read().await;
        let mut trades = runs.get(&run_id).map(|r| r.trades.clone()).unwrap_or_default();
        trades.sort_by_key(|t| t.sequence);
        Ok(trades)
    }

    async fn insert_equity_points(
        &self,
        run_id: Uuid,
        points: &[EquityCurvePoint],
    ) -> BacktestResult<usize> {
        let mut runs = self.runs.write().await;
        let record = runs.get_mut(&run_id).ok_or_else(|| missing(run_id))?;
        record.equity_curve.extend_from_slice(points);
        Ok(points.len())
    }

    async fn list_equity_curve(
        &self,
        run_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> BacktestResult<Vec<EquityCurvePoint>> {
        let runs = self.runs.read().await;
        let mut points: Vec<EquityCurvePoint> = runs
            .get(&run_id)
            .map(|r| {
                r.equity_curve
                    .iter()
                    .filter(|p| start.map_or(true, |s| p.timestamp >= s))
                    .filter(|p| end.map_or(true, |e| p.timestamp <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_core::{BacktestRunConfig, TimeHorizon};
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn run() -> BacktestRun {
        BacktestRun::start(BacktestRunConfig::new(
            "scheduled",
            "AAPL",
            TimeHorizon::Swing,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            dec!(10000),
        ))
    }

    fn point(day: i64) -> EquityCurvePoint {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        EquityCurvePoint {
            timestamp: ts,
            cash: dec!(10000),
            stock_value: Decimal::ZERO,
            total_equity: dec!(10000),
            portfolio_high_water_mark: dec!(10000),
            drawdown: Decimal::ZERO,
            drawdown_pct: Decimal::ZERO,
            cumulative_return_pct: Decimal::ZERO,
            trade_count: 0,
        }
    }

    #[tokio::test]
    async fn test_run_crud() {
        let store = InMemoryBacktestStore::new();
        let mut run = run();
        store.create_run(&run).await.unwrap();
        assert!(store.create_run(&run).await.is_err());

        run.fail("boom", 5).unwrap();
        store.update_run(&run).await.unwrap();
        let loaded = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.error_message.as_deref(), Some("boom"));

        store.delete_run(run.id).await.unwrap();
        assert!(store.get_run(run.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_equity_range_query() {
        let store = InMemoryBacktestStore::new();
        let run = run();
        store.create_run(&run).await.unwrap();

        let points: Vec<_> = (0..10).map(point).collect();
        assert_eq!(store.insert_equity_points(run.id, &points).await.unwrap(), 10);

        let all = store.list_equity_curve(run.id, None, None).await.unwrap();
        assert_eq!(all.len(), 10);

        let slice = store
            .list_equity_curve(run.id, Some(points[2].timestamp), Some(points[4].timestamp))
            .await
            .unwrap();
        assert_eq!(slice.len(), 3);
    }

    #[tokio::test]
    async fn test_writes_to_unknown_run_fail() {
        let store = InMemoryBacktestStore::new();
        let result = store.insert_equity_points(Uuid::new_v4(), &[point(0)]).await;
        assert!(matches!(result, Err(BacktestError::Persistence(_))));
    }
}

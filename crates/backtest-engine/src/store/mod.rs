//! 백테스트 결과 저장소.
//!
//! 실행, 포지션, 거래, 자산 곡선의 CRUD와 정렬된 조회를 제공합니다.
//! 자산 곡선은 실행 종료 시 한 번의 일괄 삽입으로 저장됩니다.

mod memory;
mod postgres;

pub use memory::InMemoryBacktestStore;
pub use postgres::PgBacktestStore;

use crate::error::BacktestResult;
use async_trait::async_trait;
use backtest_core::{BacktestRun, EquityCurvePoint, Position, Trade};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 백테스트 저장소.
#[async_trait]
pub trait BacktestStore: Send + Sync {
    /// 새 실행을 저장합니다.
    async fn create_run(&self, run: &BacktestRun) -> BacktestResult<()>;

    /// 실행 상태, 지표, 에러 메시지를 갱신합니다.
    async fn update_run(&self, run: &BacktestRun) -> BacktestResult<()>;

    /// 실행을 조회합니다.
    async fn get_run(&self, run_id: Uuid) -> BacktestResult<Option<BacktestRun>>;

    /// 실행과 관련 데이터를 모두 삭제합니다.
    async fn delete_run(&self, run_id: Uuid) -> BacktestResult<()>;

    /// 포지션을 (실행, 심볼) 키로 저장하거나 갱신합니다.
    async fn upsert_position(&self, run_id: Uuid, position: &Position) -> BacktestResult<()>;

    /// 실행의 포지션을 심볼 순으로 조회합니다.
    async fn list_positions(&self, run_id: Uuid) -> BacktestResult<Vec<Position>>;

    /// 거래를 원장에 추가합니다.
    async fn insert_trade(&self, trade: &Trade) -> BacktestResult<()>;

    /// 실행의 거래를 원장 순번 순으로 조회합니다.
    async fn list_trades(&self, run_id: Uuid) -> BacktestResult<Vec<Trade>>;

    /// 자산 곡선 스냅샷을 일괄 삽입하고 삽입된 개수를 반환합니다.
    async fn insert_equity_points(
        &self,
        run_id: Uuid,
        points: &[EquityCurvePoint],
    ) -> BacktestResult<usize>;

    /// `[start, end]` 구간의 자산 곡선을 시간순으로 조회합니다. `None`은 무제한.
    async fn list_equity_curve(
        &self,
        run_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> BacktestResult<Vec<EquityCurvePoint>>;
}

//! 백테스트 시뮬레이션 엔진.
//!
//! - `BacktestController` - 실행 생명주기와 바 단위 시뮬레이션 루프
//! - `VirtualPortfolioEngine` - 가상 현금, 포지션, 거래 원장, 자산 곡선
//! - `PerformanceAnalytics` - 완료된 실행의 성과 지표
//! - `SignalEvaluator` / `StrategyRegistry` - 진입/청산 결정 함수
//! - `BacktestStore` - 실행, 포지션, 거래, 자산 곡선 저장소

pub mod controller;
pub mod error;
pub mod performance;
pub mod portfolio;
pub mod store;
pub mod strategy;
pub mod telemetry;

pub use controller::BacktestController;
pub use error::{BacktestError, BacktestResult};
pub use performance::{compute_metrics, PerformanceAnalytics};
pub use portfolio::{order_quantity, OrderDiagnostic, OrderOutcome, VirtualPortfolioEngine};
pub use store::{BacktestStore, InMemoryBacktestStore, PgBacktestStore};
pub use strategy::{
    ScheduledEntryExit, SignalContext, SignalEvaluator, SmaCrossover, StrategyRegistry,
};

//! 백테스트 도메인 모델.
//!
//! - `HistoricalBar` - 과거 가격 바
//! - `Side` - 주문 방향
//! - `Position` - 심볼별 가상 포지션
//! - `Trade` - 불변 거래 원장 항목
//! - `EquityCurvePoint` - 자산 곡선 스냅샷
//! - `BacktestRun` - 실행 설정과 생명주기
//! - `PerformanceMetrics` - 실행 결과 성과 지표

mod equity;
mod market_data;
mod metrics;
mod order;
mod position;
mod run;
mod trade;

pub use equity::*;
pub use market_data::*;
pub use metrics::*;
pub use order::*;
pub use position::*;
pub use run::*;
pub use trade::*;

//! 백테스트 메트릭 헬퍼.
//!
//! 레코더 설치는 호출하는 애플리케이션의 몫이며, 설치되지 않은 경우
//! 기록은 무시됩니다.

use backtest_core::RunStatus;
use metrics::{counter, gauge, histogram};

/// 종료된 실행 카운터 증가.
pub fn record_run_finished(status: RunStatus, duration_secs: f64) {
    counter!("backtest_runs_total", "status" => status.as_str().to_string()).increment(1);
    histogram!("backtest_run_duration_seconds", "status" => status.as_str().to_string())
        .record(duration_secs);
}

/// 건너뛴 주문 카운터 증가.
pub fn record_order_skipped(reason: &str) {
    counter!("backtest_orders_skipped_total", "reason" => reason.to_string()).increment(1);
}

/// 체결된 주문 카운터 증가.
pub fn record_order_executed(side: &str) {
    counter!("backtest_orders_executed_total", "side" => side.to_string()).increment(1);
}

/// 처리한 바 수 기록.
pub fn set_bars_processed(symbol: &str, count: usize) {
    gauge!("backtest_bars_processed", "symbol" => symbol.to_string()).set(count as f64);
}

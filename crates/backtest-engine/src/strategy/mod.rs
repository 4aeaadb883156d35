//! 신호 평가기.
//!
//! 컨트롤러는 매 바마다 평가기에 현재 바, 최근 바 윈도우, 오픈 포지션을
//! 넘깁니다. 포지션이 있으면 청산 여부를, 없으면 진입 여부를 묻는
//! 것입니다. 평가기는 전략 ID로 [`StrategyRegistry`]에 등록합니다.

mod rules;

pub use rules::{ScheduledEntryExit, SmaCrossover};

use crate::error::BacktestResult;
use async_trait::async_trait;
use backtest_core::{HistoricalBar, Position};
use std::collections::HashMap;
use std::sync::Arc;

/// 평가기에 전달되는 바 단위 입력.
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    /// 실행 내 바 순번 (0부터)
    pub bar_index: usize,
    /// 현재 바
    pub bar: &'a HistoricalBar,
    /// 현재 바를 포함한 최근 바 (시간순)
    pub window: &'a [HistoricalBar],
    /// 오픈 포지션. `Some`이면 청산 평가, `None`이면 진입 평가
    pub position: Option<&'a Position>,
}

impl SignalContext<'_> {
    /// 청산 평가인지 확인합니다.
    pub fn is_exit(&self) -> bool {
        self.position.is_some()
    }
}

/// 진입/청산 결정 함수.
#[async_trait]
pub trait SignalEvaluator: Send + Sync {
    /// 평가기 이름
    fn name(&self) -> &str;

    /// 신호 여부를 반환합니다.
    async fn evaluate(&self, ctx: &SignalContext<'_>) -> BacktestResult<bool>;
}

/// 전략 ID별 평가기 레지스트리.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    evaluators: HashMap<String, Arc<dyn SignalEvaluator>>,
}

impl StrategyRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 파라미터의 참조 평가기를 등록한 레지스트리.
    ///
    /// - `scheduled_entry_exit`: 20바마다 진입, 10바 보유
    /// - `sma_crossover`: 10/20 이동평균 교차
    pub fn with_reference_evaluators() -> Self {
        let mut registry = Self::new();
        registry.register("scheduled_entry_exit", ScheduledEntryExit::new(20, 10));
        registry.register("sma_crossover", SmaCrossover::new(10, 20));
        registry
    }

    /// 평가기를 등록합니다. 같은 ID가 있으면 교체합니다.
    pub fn register(&mut self, id: impl Into<String>, evaluator: impl SignalEvaluator + 'static) {
        self.evaluators.insert(id.into(), Arc::new(evaluator));
    }

    /// 이미 공유 중인 평가기를 등록합니다.
    pub fn register_arc(&mut self, id: impl Into<String>, evaluator: Arc<dyn SignalEvaluator>) {
        self.evaluators.insert(id.into(), evaluator);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SignalEvaluator>> {
        self.evaluators.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.evaluators.contains_key(id)
    }

    /// 등록된 전략 ID (정렬됨)
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.evaluators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

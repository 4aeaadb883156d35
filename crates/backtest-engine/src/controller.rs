//! 백테스트 실행 컨트롤러.
//!
//! 실행 하나의 생명주기(`RUNNING → COMPLETED | FAILED`)를 관리합니다.
//!
//! 1. 설정 검증 후 `RUNNING` 실행 레코드 생성
//! 2. 전략 평가기 조회, 과거 바 로드
//! 3. 바마다 시가 평가 → 청산 평가 → 진입 평가와 수량 결정 → 자산 스냅샷
//! 4. 자산 곡선 일괄 저장 후 성과 지표 계산, `COMPLETED`
//!
//! 2~4 단계의 에러와 `COMPLETED` 저장 실패는 실행을 `FAILED`로 기록한 뒤
//! 호출자에게 반환됩니다. 루프 이후의 에러는 `RunExecution`으로 감쌉니다.

use crate::error::{BacktestError, BacktestResult};
use crate::performance::PerformanceAnalytics;
use crate::portfolio::{order_quantity, VirtualPortfolioEngine};
use crate::store::BacktestStore;
use crate::strategy::{SignalContext, SignalEvaluator, StrategyRegistry};
use crate::telemetry;
use backtest_core::{
    backtest_span, is_chronological, AnalyticsConfig, BacktestRun, BacktestRunConfig, DecimalExt,
    EngineConfig, HistoricalBar, PerformanceMetrics, RunStatus, STRATEGY_ENTRY, STRATEGY_EXIT,
};
use backtest_data::HistoricalDataProvider;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

/// 백테스트 컨트롤러.
///
/// 실행마다 새 [`VirtualPortfolioEngine`]을 만들어 소유하므로 여러 실행을
/// 동시에 돌려도 상태를 공유하지 않습니다.
pub struct BacktestController {
    provider: Arc<HistoricalDataProvider>,
    store: Arc<dyn BacktestStore>,
    registry: Arc<StrategyRegistry>,
    analytics: AnalyticsConfig,
    engine: EngineConfig,
}

impl BacktestController {
    /// 기본 분석/엔진 설정으로 컨트롤러를 생성합니다.
    pub fn new(
        provider: Arc<HistoricalDataProvider>,
        store: Arc<dyn BacktestStore>,
        registry: Arc<StrategyRegistry>,
    ) -> Self {
        Self {
            provider,
            store,
            registry,
            analytics: AnalyticsConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// 성과 분석 설정
    pub fn with_analytics_config(mut self, config: AnalyticsConfig) -> Self {
        self.analytics = config;
        self
    }

    /// 엔진 설정
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    /// 백테스트를 실행하고 실행 ID를 반환합니다.
    pub async fn run_backtest(&self, config: BacktestRunConfig) -> BacktestResult<Uuid> {
        self.run_backtest_with_cancel(config, CancellationToken::new())
            .await
    }

    /// 바 사이에서 취소 토큰을 확인하며 백테스트를 실행합니다.
    ///
    /// 취소된 실행은 `FAILED`로 기록되고 `Cancelled`를 원인으로 하는
    /// 에러를 반환합니다.
    #[instrument(
        skip(self, config, cancel),
        fields(strategy_id = %config.strategy_id, symbol = %config.symbol)
    )]
    pub async fn run_backtest_with_cancel(
        &self,
        config: BacktestRunConfig,
        cancel: CancellationToken,
    ) -> BacktestResult<Uuid> {
        config.validate()?;

        let started = Instant::now();
        let mut run = BacktestRun::start(config);
        self.store.create_run(&run).await?;
        info!(run_id = %run.id, horizon = %run.config.time_horizon, "백테스트 시작");

        let result = self
            .execute(&run, &cancel)
            .instrument(backtest_span!("backtest_run", run.id, run.config.symbol))
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let elapsed_secs = started.elapsed().as_secs_f64();

        let result = match result {
            Ok(metrics) => self.persist_completed(&run, metrics, elapsed_ms).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(completed) => {
                telemetry::record_run_finished(RunStatus::Completed, elapsed_secs);

                info!(
                    run_id = %completed.id,
                    elapsed_ms = elapsed_ms,
                    total_return_pct = %completed.metrics.as_ref().map_or(Decimal::ZERO, |m| m.total_return_pct),
                    "백테스트 완료"
                );
                Ok(completed.id)
            }
            Err(err) => {
                run.fail(err.to_string(), elapsed_ms)?;
                if let Err(persist_err) = self.store.update_run(&run).await {
                    error!(run_id = %run.id, error = %persist_err, "실패 상태 저장 실패");
                }
                telemetry::record_run_finished(RunStatus::Failed, elapsed_secs);

                error!(run_id = %run.id, elapsed_ms = elapsed_ms, error = %err, "백테스트 실패");
                Err(err)
            }
        }
    }

    /// `COMPLETED` 레코드를 저장합니다.
    ///
    /// 원본 실행은 `RUNNING`으로 남겨 두므로 저장이 실패해도 호출자가
    /// `FAILED`로 기록할 수 있습니다.
    async fn persist_completed(
        &self,
        run: &BacktestRun,
        metrics: PerformanceMetrics,
        elapsed_ms: u64,
    ) -> BacktestResult<BacktestRun> {
        let mut completed = run.clone();
        completed.complete(metrics, elapsed_ms)?;
        self.store
            .update_run(&completed)
            .await
            .map_err(|e| e.into_run_execution(run.id))?;
        Ok(completed)
    }

    async fn execute(
        &self,
        run: &BacktestRun,
        cancel: &CancellationToken,
    ) -> BacktestResult<PerformanceMetrics> {
        let config = &run.config;

        let evaluator = self
            .registry
            .get(&config.strategy_id)
            .ok_or_else(|| BacktestError::StrategyNotFound(config.strategy_id.clone()))?;

        let mut bars = self
            .provider
            .load_historical_bars(
                &config.symbol,
                config.time_horizon,
                config.start_date,
                config.end_date,
            )
            .await?;
        if !is_chronological(&bars) {
            warn!(run_id = %run.id, "바가 시간순이 아니어서 정렬합니다");
            bars.sort_by_key(|b| b.timestamp);
            bars.dedup_by_key(|b| b.timestamp);
        }

        let mut engine = VirtualPortfolioEngine::new(run.id, Arc::clone(&self.store))
            .with_quantity_epsilon(self.engine.quantity_epsilon);
        engine.initialize(
            config.initial_cash,
            config.slippage_bps,
            config.commission_per_trade,
        )?;

        self.finish(&mut engine, evaluator.as_ref(), config, &bars, cancel)
            .await
            .map_err(|e| e.into_run_execution(run.id))
    }

    async fn finish(
        &self,
        engine: &mut VirtualPortfolioEngine,
        evaluator: &dyn SignalEvaluator,
        config: &BacktestRunConfig,
        bars: &[HistoricalBar],
        cancel: &CancellationToken,
    ) -> BacktestResult<PerformanceMetrics> {
        self.simulate(engine, evaluator, config, bars, cancel).await?;

        // 지표는 저장된 자산 곡선에서 계산하므로 먼저 저장
        engine.finalize_equity_curve().await?;
        engine.persist_positions().await?;

        PerformanceAnalytics::new(Arc::clone(&self.store), self.analytics.clone())
            .calculate_metrics(engine.run_id())
            .await
    }

    async fn simulate(
        &self,
        engine: &mut VirtualPortfolioEngine,
        evaluator: &dyn SignalEvaluator,
        config: &BacktestRunConfig,
        bars: &[HistoricalBar],
        cancel: &CancellationToken,
    ) -> BacktestResult<()> {
        let symbol = config.symbol.as_str();
        let window_size = self.engine.trailing_window.max(1);
        let buy_slippage = Decimal::ONE + config.slippage_bps.bps_to_ratio();

        for (index, bar) in bars.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(bar_index = index, "바 처리 중 취소됨");
                return Err(BacktestError::Cancelled);
            }

            let window = &bars[(index + 1).saturating_sub(window_size)..=index];

            engine.update_current_price(symbol, bar.close, bar.timestamp);

            if let Some(position) = engine.open_position(symbol).cloned() {
                let ctx = SignalContext {
                    bar_index: index,
                    bar,
                    window,
                    position: Some(&position),
                };
                if evaluator.evaluate(&ctx).await? {
                    debug!(bar_index = index, "청산 신호");
                    engine
                        .execute_sell_order(
                            symbol,
                            position.quantity,
                            bar.close,
                            bar.timestamp,
                            bar.timestamp,
                            STRATEGY_EXIT,
                        )
                        .await?;
                }
            } else {
                let ctx = SignalContext {
                    bar_index: index,
                    bar,
                    window,
                    position: None,
                };
                if evaluator.evaluate(&ctx).await? {
                    // 슬리피지 반영 체결가 기준으로 수량 결정
                    let quantity = order_quantity(
                        config.position_sizing,
                        config.position_size,
                        engine.cash(),
                        bar.close * buy_slippage,
                    );
                    debug!(bar_index = index, quantity = %quantity, "진입 신호");

                    if quantity > Decimal::ZERO {
                        engine
                            .execute_buy_order(
                                symbol,
                                quantity,
                                bar.close,
                                bar.timestamp,
                                bar.timestamp,
                                STRATEGY_ENTRY,
                            )
                            .await?;
                    }
                }
            }

            engine.record_equity_curve_snapshot(bar.timestamp);
        }

        telemetry::set_bars_processed(symbol, bars.len());
        debug!(
            bars = bars.len(),
            trades = engine.trades().len(),
            skipped = engine.diagnostics().len(),
            "시뮬레이션 루프 완료"
        );
        Ok(())
    }
}

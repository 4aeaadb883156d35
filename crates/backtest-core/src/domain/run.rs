//! 백테스트 실행 설정과 생명주기.
//!
//! 실행은 `RUNNING`으로 생성되어 정확히 한 번 `COMPLETED` 또는 `FAILED`로
//! 종료됩니다. 종료 상태에서는 더 이상 전이할 수 없습니다.

use crate::domain::PerformanceMetrics;
use crate::error::{CoreError, CoreResult};
use crate::types::TimeHorizon;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 포지션 크기 결정 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSizing {
    /// 고정 금액 (position_size = 달러)
    FixedDollar,
    /// 고정 주식 수 (position_size = 주)
    FixedShares,
    /// 가용 현금 대비 비율 (position_size = %)
    PercentEquity,
}

impl PositionSizing {
    /// 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSizing::FixedDollar => "FIXED_DOLLAR",
            PositionSizing::FixedShares => "FIXED_SHARES",
            PositionSizing::PercentEquity => "PERCENT_EQUITY",
        }
    }
}

impl fmt::Display for PositionSizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionSizing {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIXED_DOLLAR" => Ok(PositionSizing::FixedDollar),
            "FIXED_SHARES" => Ok(PositionSizing::FixedShares),
            "PERCENT_EQUITY" => Ok(PositionSizing::PercentEquity),
            _ => Err(CoreError::InvalidConfig(format!(
                "알 수 없는 포지션 크기 방식: {}",
                s
            ))),
        }
    }
}

/// 백테스트 실행 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRunConfig {
    /// 전략 ID
    pub strategy_id: String,
    /// 심볼
    pub symbol: String,
    /// 투자 기간
    pub time_horizon: TimeHorizon,
    /// 시작일 (포함)
    pub start_date: NaiveDate,
    /// 종료일 (포함)
    pub end_date: NaiveDate,
    /// 초기 현금
    pub initial_cash: Decimal,
    /// 포지션 크기 방식
    #[serde(default = "default_position_sizing")]
    pub position_sizing: PositionSizing,
    /// 포지션 크기 (방식에 따라 달러, 주, %)
    #[serde(default = "default_position_size")]
    pub position_size: Decimal,
    /// 슬리피지 (bp)
    #[serde(default)]
    pub slippage_bps: Decimal,
    /// 거래당 고정 수수료
    #[serde(default)]
    pub commission_per_trade: Decimal,
}

fn default_position_sizing() -> PositionSizing {
    PositionSizing::PercentEquity
}

/// 가용 현금의 10%
fn default_position_size() -> Decimal {
    dec!(10)
}

impl BacktestRunConfig {
    /// 새 실행 설정을 생성합니다. 크기 방식은 가용 현금의 10%입니다.
    pub fn new(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        time_horizon: TimeHorizon,
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial_cash: Decimal,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            time_horizon,
            start_date,
            end_date,
            initial_cash,
            position_sizing: default_position_sizing(),
            position_size: default_position_size(),
            slippage_bps: Decimal::ZERO,
            commission_per_trade: Decimal::ZERO,
        }
    }

    /// 포지션 크기 방식 설정
    pub fn with_sizing(mut self, sizing: PositionSizing, size: Decimal) -> Self {
        self.position_sizing = sizing;
        self.position_size = size;
        self
    }

    /// 슬리피지 설정 (bp)
    pub fn with_slippage_bps(mut self, bps: Decimal) -> Self {
        self.slippage_bps = bps;
        self
    }

    /// 거래당 수수료 설정
    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.commission_per_trade = commission;
        self
    }

    /// 설정 유효성 검사.
    pub fn validate(&self) -> CoreResult<()> {
        if self.strategy_id.trim().is_empty() {
            return Err(CoreError::InvalidConfig("전략 ID가 비어 있습니다".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidConfig("심볼이 비어 있습니다".into()));
        }
        if self.end_date < self.start_date {
            return Err(CoreError::InvalidConfig(format!(
                "종료일({})이 시작일({})보다 앞섭니다",
                self.end_date, self.start_date
            )));
        }
        if self.initial_cash <= Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "초기 현금은 0보다 커야 합니다".into(),
            ));
        }
        if self.position_size <= Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "포지션 크기는 0보다 커야 합니다".into(),
            ));
        }
        if self.position_sizing == PositionSizing::PercentEquity && self.position_size > dec!(100) {
            return Err(CoreError::InvalidConfig(format!(
                "PERCENT_EQUITY 비율은 100을 넘을 수 없습니다: {}",
                self.position_size
            )));
        }
        if self.slippage_bps < Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "슬리피지는 음수일 수 없습니다".into(),
            ));
        }
        if self.commission_per_trade < Decimal::ZERO {
            return Err(CoreError::InvalidConfig(
                "수수료는 음수일 수 없습니다".into(),
            ));
        }
        Ok(())
    }
}

/// 실행 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// 실행 중
    Running,
    /// 정상 완료
    Completed,
    /// 실패
    Failed,
}

impl RunStatus {
    /// 종료 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(RunStatus::Running),
            "COMPLETED" => Ok(RunStatus::Completed),
            "FAILED" => Ok(RunStatus::Failed),
            _ => Err(CoreError::Parse(format!("알 수 없는 실행 상태: {}", s))),
        }
    }
}

/// 백테스트 실행 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRun {
    /// 실행 ID
    pub id: Uuid,
    /// 실행 설정
    pub config: BacktestRunConfig,
    /// 상태
    pub status: RunStatus,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각
    pub finished_at: Option<DateTime<Utc>>,
    /// 실행 시간 (밀리초)
    pub execution_time_ms: Option<u64>,
    /// 실패 메시지
    pub error_message: Option<String>,
    /// 최종 성과 지표
    pub metrics: Option<PerformanceMetrics>,
}

impl BacktestRun {
    /// `RUNNING` 상태의 새 실행을 생성합니다.
    pub fn start(config: BacktestRunConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            execution_time_ms: None,
            error_message: None,
            metrics: None,
        }
    }

    /// `COMPLETED`로 전이하고 지표를 기록합니다.
    pub fn complete(&mut self, metrics: PerformanceMetrics, execution_time_ms: u64) -> CoreResult<()> {
        self.transition(RunStatus::Completed)?;
        self.metrics = Some(metrics);
        self.execution_time_ms = Some(execution_time_ms);
        Ok(())
    }

    /// `FAILED`로 전이하고 에러 메시지를 기록합니다.
    pub fn fail(&mut self, message: impl Into<String>, execution_time_ms: u64) -> CoreResult<()> {
        self.transition(RunStatus::Failed)?;
        self.error_message = Some(message.into());
        self.execution_time_ms = Some(execution_time_ms);
        Ok(())
    }

    fn transition(&mut self, to: RunStatus) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

//! 백테스트 실행 에러.
//!
//! 설정/데이터 에러는 시뮬레이션 루프 진입 전에 실행을 중단시키고,
//! 루프 이후의 에러는 `RunExecution`으로 감싸 호출자에게 전달됩니다.
//! 주문 단위의 잔고 부족이나 포지션 없음은 에러가 아니라
//! `OrderDiagnostic`으로 보고됩니다.

use backtest_core::CoreError;
use backtest_data::DataError;
use thiserror::Error;
use uuid::Uuid;

/// 백테스트 에러.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 잘못된 실행 설정
    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    /// 등록되지 않은 전략
    #[error("전략을 찾을 수 없음: {0}")]
    StrategyNotFound(String),

    /// 최소 바 수 미달
    #[error("과거 데이터 부족: {symbol} ({available}/{required} 바)")]
    DataUnavailable {
        /// 심볼
        symbol: String,
        /// 사용 가능한 바 수
        available: usize,
        /// 필요한 최소 바 수
        required: usize,
        /// 페치 시도에서 발생한 소스 오류 (요청 한도, 데이터 없음 등)
        #[source]
        cause: Option<Box<DataError>>,
    },

    /// 데이터 로드 에러
    #[error("데이터 에러: {0}")]
    Data(DataError),

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Persistence(String),

    /// 신호 평가기 에러
    #[error("신호 평가 에러: {0}")]
    Evaluator(String),

    /// 잘못된 실행 상태
    #[error("잘못된 상태: {0}")]
    InvalidState(String),

    /// 자산 곡선이 이미 저장됨
    #[error("자산 곡선이 이미 저장되었습니다")]
    AlreadyFinalized,

    /// 바 사이에서 취소됨
    #[error("실행이 취소되었습니다")]
    Cancelled,

    /// 시뮬레이션 중 발생한 에러
    #[error("백테스트 실행 실패 ({run_id}): {source}")]
    RunExecution {
        /// 실행 ID
        run_id: Uuid,
        /// 원인 에러
        source: Box<BacktestError>,
    },
}

/// 백테스트 작업을 위한 Result 타입.
pub type BacktestResult<T> = Result<T, BacktestError>;

impl BacktestError {
    /// 시뮬레이션 루프 전에 실행을 중단시키는 에러인지 확인합니다.
    pub fn is_fatal_before_loop(&self) -> bool {
        matches!(
            self,
            BacktestError::InvalidConfig(_)
                | BacktestError::StrategyNotFound(_)
                | BacktestError::DataUnavailable { .. }
                | BacktestError::Data(_)
        )
    }

    /// `RunExecution` 래퍼를 벗긴 원인 에러.
    pub fn root_cause(&self) -> &BacktestError {
        match self {
            BacktestError::RunExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// 루프 중 에러를 `RunExecution`으로 감쌉니다. 이미 감싼 에러는 그대로 둡니다.
    pub fn into_run_execution(self, run_id: Uuid) -> Self {
        match self {
            wrapped @ BacktestError::RunExecution { .. } => wrapped,
            other => BacktestError::RunExecution {
                run_id,
                source: Box::new(other),
            },
        }
    }
}

impl From<DataError> for BacktestError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::DataUnavailable {
                symbol,
                available,
                required,
                cause,
            } => BacktestError::DataUnavailable {
                symbol,
                available,
                required,
                cause,
            },
            other => BacktestError::Data(other),
        }
    }
}

impl From<CoreError> for BacktestError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig(msg) | CoreError::Parse(msg) => BacktestError::InvalidConfig(msg),
            transition @ CoreError::InvalidTransition { .. } => {
                BacktestError::InvalidState(transition.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for BacktestError {
    fn from(err: sqlx::Error) -> Self {
        BacktestError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for BacktestError {
    fn from(err: serde_json::Error) -> Self {
        BacktestError::Persistence(format!("직렬화 실패: {}", err))
    }
}

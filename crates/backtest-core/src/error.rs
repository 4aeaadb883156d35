//! 도메인 모델 에러 타입.
//!
//! 설정 검증, 문자열 파싱, 실행 상태 전이에서 발생하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// 잘못된 백테스트 설정
    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    /// 허용되지 않는 실행 상태 전이
    #[error("잘못된 상태 전이: {from} -> {to}")]
    InvalidTransition {
        /// 현재 상태
        from: String,
        /// 요청된 상태
        to: String,
    },

    /// 문자열 파싱 실패
    #[error("파싱 에러: {0}")]
    Parse(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 설정 관련 에러인지 확인합니다.
    ///
    /// 설정 에러는 시뮬레이션 루프 진입 전에 실행을 중단시킵니다.
    pub fn is_config(&self) -> bool {
        matches!(self, CoreError::InvalidConfig(_) | CoreError::Parse(_))
    }
}

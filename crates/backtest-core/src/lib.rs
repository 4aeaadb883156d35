//! 백테스트 시뮬레이터 핵심 라이브러리.
//!
//! 이 crate는 다음을 제공합니다:
//! - 도메인 모델 (바, 포지션, 거래, 자산 곡선, 백테스트 실행)
//! - 정밀 계산을 위한 Decimal 타입과 타임프레임
//! - 에러 타입
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use types::*;

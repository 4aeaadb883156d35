//! 공통 타입 정의.

mod decimal;
mod timeframe;

pub use decimal::*;
pub use timeframe::*;

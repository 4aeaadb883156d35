//! 가상 포트폴리오.
//!
//! - `VirtualPortfolioEngine` - 현금, 포지션, 거래 원장, 자산 곡선 관리
//! - `order_quantity` - 포지션 크기 결정
//! - `OrderDiagnostic` / `OrderOutcome` - 건너뛴 주문 보고

mod diagnostics;
mod engine;
mod sizing;

pub use diagnostics::{OrderDiagnostic, OrderOutcome};
pub use engine::VirtualPortfolioEngine;
pub use sizing::order_quantity;

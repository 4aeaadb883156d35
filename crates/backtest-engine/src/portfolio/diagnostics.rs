//! 주문 진단.
//!
//! 잔고 부족, 포지션 없는 매도 같은 주문 단위 문제는 실행을 중단시키지
//! 않습니다. 주문은 건너뛰고 진단 항목으로 남깁니다.

use backtest_core::{Price, Quantity, Trade};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 건너뛴 주문에 대한 진단.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDiagnostic {
    /// 순 매수 금액이 가용 현금을 초과
    InsufficientFunds {
        symbol: String,
        required: Decimal,
        available: Decimal,
        bar: DateTime<Utc>,
    },
    /// 오픈 포지션이 없는 심볼에 대한 매도
    NoOpenPosition {
        symbol: String,
        bar: DateTime<Utc>,
    },
    /// 0 이하 수량
    InvalidQuantity {
        symbol: String,
        quantity: Quantity,
        bar: DateTime<Utc>,
    },
    /// 0 이하 가격
    InvalidPrice {
        symbol: String,
        price: Price,
        bar: DateTime<Utc>,
    },
}

impl OrderDiagnostic {
    /// 메트릭 라벨로 쓰는 진단 종류.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderDiagnostic::InsufficientFunds { .. } => "insufficient_funds",
            OrderDiagnostic::NoOpenPosition { .. } => "no_open_position",
            OrderDiagnostic::InvalidQuantity { .. } => "invalid_quantity",
            OrderDiagnostic::InvalidPrice { .. } => "invalid_price",
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            OrderDiagnostic::InsufficientFunds { symbol, .. }
            | OrderDiagnostic::NoOpenPosition { symbol, .. }
            | OrderDiagnostic::InvalidQuantity { symbol, .. }
            | OrderDiagnostic::InvalidPrice { symbol, .. } => symbol,
        }
    }

    pub fn bar(&self) -> DateTime<Utc> {
        match self {
            OrderDiagnostic::InsufficientFunds { bar, .. }
            | OrderDiagnostic::NoOpenPosition { bar, .. }
            | OrderDiagnostic::InvalidQuantity { bar, .. }
            | OrderDiagnostic::InvalidPrice { bar, .. } => *bar,
        }
    }
}

impl fmt::Display for OrderDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDiagnostic::InsufficientFunds {
                symbol,
                required,
                available,
                ..
            } => write!(f, "{} 잔고 부족: 필요 {}, 가용 {}", symbol, required, available),
            OrderDiagnostic::NoOpenPosition { symbol, .. } => {
                write!(f, "{} 오픈 포지션 없음", symbol)
            }
            OrderDiagnostic::InvalidQuantity { symbol, quantity, .. } => {
                write!(f, "{} 잘못된 수량: {}", symbol, quantity)
            }
            OrderDiagnostic::InvalidPrice { symbol, price, .. } => {
                write!(f, "{} 잘못된 가격: {}", symbol, price)
            }
        }
    }
}

/// 주문 처리 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    /// 체결되어 원장에 추가됨
    Executed(Trade),
    /// 건너뜀
    Skipped(OrderDiagnostic),
}

impl OrderOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, OrderOutcome::Executed(_))
    }

    /// 체결된 거래.
    pub fn trade(&self) -> Option<&Trade> {
        match self {
            OrderOutcome::Executed(trade) => Some(trade),
            OrderOutcome::Skipped(_) => None,
        }
    }

    /// 건너뛴 사유.
    pub fn diagnostic(&self) -> Option<&OrderDiagnostic> {
        match self {
            OrderOutcome::Executed(_) => None,
            OrderOutcome::Skipped(diagnostic) => Some(diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_diagnostic_accessors() {
        let bar = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let diagnostic = OrderDiagnostic::InsufficientFunds {
            symbol: "AAPL".into(),
            required: dec!(2003),
            available: dec!(1500),
            bar,
        };

        assert_eq!(diagnostic.kind(), "insufficient_funds");
        assert_eq!(diagnostic.symbol(), "AAPL");
        assert_eq!(diagnostic.bar(), bar);
        assert!(diagnostic.to_string().contains("2003"));

        let outcome = OrderOutcome::Skipped(diagnostic.clone());
        assert!(!outcome.is_executed());
        assert!(outcome.trade().is_none());
        assert_eq!(outcome.diagnostic(), Some(&diagnostic));
    }

    #[test]
    fn test_diagnostic_serializes_with_kind_tag() {
        let bar = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(OrderDiagnostic::NoOpenPosition {
            symbol: "MSFT".into(),
            bar,
        })
        .unwrap();
        assert_eq!(json["kind"], "NO_OPEN_POSITION");
        assert_eq!(json["symbol"], "MSFT");
    }
}

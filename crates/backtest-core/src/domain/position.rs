//! 가상 포지션 추적.
//!
//! 포지션은 심볼당 하나이며 포트폴리오 엔진이 소유합니다. 매수 시 원가 가중
//! 평균으로 평균 진입가를 갱신하고, 매도 시 평균 진입가를 유지한 채
//! 수량과 원가를 줄입니다.

use crate::types::{DecimalExt, Percentage, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 심볼의 롱 보유량을 나타내는 가상 포지션.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 심볼
    pub symbol: String,
    /// 보유 수량 (≥ 0)
    pub quantity: Quantity,
    /// 평균 진입가 (수수료 포함 원가 / 수량)
    pub avg_entry_price: Price,
    /// 보유 수량의 총 원가
    pub total_cost: Decimal,
    /// 최근 평가 가격
    pub current_price: Price,
    /// 평가 금액 (수량 × 현재가)
    pub market_value: Decimal,
    /// 미실현 손익 (평가 금액 - 총 원가)
    pub unrealized_pl: Decimal,
    /// 미실현 손익률 (%)
    pub unrealized_pl_pct: Percentage,
    /// 미실현 손익 최고치 (단조 비감소)
    pub high_water_mark: Decimal,
    /// 최대 낙폭 % (단조 비증가, ≤ 0)
    pub max_drawdown_pct: Percentage,
    /// 진입 바
    pub entry_bar: DateTime<Utc>,
    /// 마지막 갱신 바
    pub last_update_bar: DateTime<Utc>,
    /// 오픈 여부
    pub is_open: bool,
}

impl Position {
    /// 첫 매수로 새 포지션을 엽니다.
    ///
    /// `net_cost`는 수수료를 포함한 체결 원가이고, `mark_price`는 진입
    /// 시점의 시장 가격입니다.
    pub fn open(
        symbol: impl Into<String>,
        quantity: Quantity,
        net_cost: Decimal,
        mark_price: Price,
        at: DateTime<Utc>,
    ) -> Self {
        let mut position = Self {
            symbol: symbol.into(),
            quantity,
            avg_entry_price: net_cost.checked_ratio(quantity).unwrap_or(Decimal::ZERO),
            total_cost: net_cost,
            current_price: mark_price,
            market_value: Decimal::ZERO,
            unrealized_pl: Decimal::ZERO,
            unrealized_pl_pct: Decimal::ZERO,
            high_water_mark: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            entry_bar: at,
            last_update_bar: at,
            is_open: true,
        };
        position.revalue(mark_price, at);
        position.high_water_mark = position.unrealized_pl;
        position
    }

    /// 기존 포지션에 추가 매수하고 `mark_price`로 재평가합니다.
    pub fn add(&mut self, quantity: Quantity, net_cost: Decimal, mark_price: Price, at: DateTime<Utc>) {
        self.total_cost += net_cost;
        self.quantity += quantity;
        if let Some(avg) = self.total_cost.checked_ratio(self.quantity) {
            self.avg_entry_price = avg;
        }
        self.mark(mark_price, at);
    }

    /// 수량을 줄이고 매도 수량에 해당하는 원가를 반환합니다.
    ///
    /// 남은 수량이 `epsilon` 이하가 되면 포지션을 닫습니다.
    pub fn reduce(&mut self, quantity: Quantity, epsilon: Decimal, at: DateTime<Utc>) -> Decimal {
        if quantity >= self.quantity - epsilon {
            let cost_basis = self.total_cost;
            self.close(at);
            return cost_basis;
        }

        let cost_basis = self.avg_entry_price * quantity;
        self.quantity -= quantity;
        self.total_cost = self.avg_entry_price * self.quantity;
        self.mark(self.current_price, at);
        cost_basis
    }

    /// 시가 평가를 갱신합니다. 닫힌 포지션이면 `false`를 반환합니다.
    pub fn mark(&mut self, price: Price, at: DateTime<Utc>) -> bool {
        if !self.is_open {
            return false;
        }

        self.revalue(price, at);
        self.high_water_mark = self.high_water_mark.max(self.unrealized_pl);
        if let Some(drawdown_pct) = (self.unrealized_pl - self.high_water_mark).pct_of(self.total_cost) {
            self.max_drawdown_pct = self.max_drawdown_pct.min(drawdown_pct);
        }
        true
    }

    /// 오픈 포지션의 평가 금액. 닫힌 포지션은 0.
    pub fn open_market_value(&self) -> Decimal {
        if self.is_open {
            self.market_value
        } else {
            Decimal::ZERO
        }
    }

    fn revalue(&mut self, price: Price, at: DateTime<Utc>) {
        self.current_price = price;
        self.market_value = self.quantity * price;
        self.unrealized_pl = self.market_value - self.total_cost;
        self.unrealized_pl_pct = self.unrealized_pl.pct_of(self.total_cost).unwrap_or(Decimal::ZERO);
        self.last_update_bar = at;
    }

    fn close(&mut self, at: DateTime<Utc>) {
        self.quantity = Decimal::ZERO;
        self.total_cost = Decimal::ZERO;
        self.market_value = Decimal::ZERO;
        self.unrealized_pl = Decimal::ZERO;
        self.unrealized_pl_pct = Decimal::ZERO;
        self.last_update_bar = at;
        self.is_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_open_position() {
        let position = Position::open("AAPL", dec!(10), dec!(1001), dec!(100), day(0));

        assert!(position.is_open);
        assert_eq!(position.avg_entry_price, dec!(100.1));
        assert_eq!(position.market_value, dec!(1000));
        assert_eq!(position.unrealized_pl, dec!(-1));
        assert_eq!(position.high_water_mark, dec!(-1));
        assert_eq!(position.max_drawdown_pct, Decimal::ZERO);
    }

    #[test]
    fn test_add_weighted_average() {
        let mut position = Position::open("AAPL", dec!(10), dec!(1000), dec!(100), day(0));
        position.add(dec!(10), dec!(1200), dec!(120), day(1));

        assert_eq!(position.quantity, dec!(20));
        assert_eq!(position.total_cost, dec!(2200));
        assert_eq!(position.avg_entry_price, dec!(110));
        assert_eq!(position.market_value, dec!(2400));
        assert_eq!(position.high_water_mark, dec!(200));
    }

    #[test]
    fn test_partial_reduce_keeps_average() {
        let mut position = Position::open("AAPL", dec!(10), dec!(1000), dec!(100), day(0));
        let basis = position.reduce(dec!(4), dec!(0.00000001), day(2));

        assert_eq!(basis, dec!(400));
        assert!(position.is_open);
        assert_eq!(position.quantity, dec!(6));
        assert_eq!(position.avg_entry_price, dec!(100));
        assert_eq!(position.total_cost, dec!(600));
    }

    #[test]
    fn test_full_reduce_closes() {
        let mut position = Position::open("AAPL", dec!(10), dec!(1000), dec!(100), day(0));
        let basis = position.reduce(dec!(10), dec!(0.00000001), day(3));

        assert_eq!(basis, dec!(1000));
        assert!(!position.is_open);
        assert_eq!(position.quantity, Decimal::ZERO);
        assert_eq!(position.open_market_value(), Decimal::ZERO);
        assert!(!position.mark(dec!(120), day(4)));
    }

    #[test]
    fn test_mark_tracks_watermark_and_drawdown() {
        let mut position = Position::open("AAPL", dec!(10), dec!(1000), dec!(100), day(0));

        position.mark(dec!(110), day(1));
        assert_eq!(position.high_water_mark, dec!(100));
        assert_eq!(position.unrealized_pl_pct, dec!(10));

        position.mark(dec!(95), day(2));
        assert_eq!(position.high_water_mark, dec!(100));
        // (-50 - 100) / 1000 × 100
        assert_eq!(position.max_drawdown_pct, dec!(-15));

        position.mark(dec!(105), day(3));
        assert_eq!(position.max_drawdown_pct, dec!(-15));
        assert_eq!(position.last_update_bar, day(3));
    }
}

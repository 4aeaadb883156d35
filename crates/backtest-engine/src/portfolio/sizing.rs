//! 포지션 크기 결정.

use backtest_core::{PositionSizing, Price, Quantity, HUNDRED};
use rust_decimal::Decimal;

/// 설정된 크기 방식으로 매수 수량(정수 주)을 계산합니다.
///
/// - `FIXED_DOLLAR`: `floor(min(size, cash) / price)`
/// - `FIXED_SHARES`: `min(floor(size), floor(cash / price))`
/// - `PERCENT_EQUITY`: `floor(cash × size / 100 / price)`
///
/// 가격이나 현금이 0 이하면 0을 반환합니다.
pub fn order_quantity(
    sizing: PositionSizing,
    position_size: Decimal,
    available_cash: Decimal,
    price: Price,
) -> Quantity {
    if price <= Decimal::ZERO || available_cash <= Decimal::ZERO || position_size <= Decimal::ZERO
    {
        return Decimal::ZERO;
    }

    let quantity = match sizing {
        PositionSizing::FixedDollar => position_size.min(available_cash) / price,
        PositionSizing::FixedShares => position_size.floor().min((available_cash / price).floor()),
        PositionSizing::PercentEquity => available_cash * position_size / HUNDRED / price,
    };

    quantity.floor().max(Decimal::ZERO)
}

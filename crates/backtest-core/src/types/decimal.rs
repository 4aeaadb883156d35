//! 정밀한 금융 계산을 위한 Decimal 유틸리티.
//!
//! 모든 금액, 가격, 수량은 부동소수점 대신 `Decimal`로 계산합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입 (주 단위).
pub type Quantity = Decimal;

/// 퍼센트 타입 (5.25 = 5.25%).
pub type Percentage = Decimal;

/// 100 (퍼센트 환산용).
pub const HUNDRED: Decimal = dec!(100);

/// 1 basis point 분모 (1bp = 1/10000).
pub const BPS_DENOMINATOR: Decimal = dec!(10000);

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 0으로 나누면 `None`을 반환하는 나눗셈.
    fn checked_ratio(&self, denominator: Decimal) -> Option<Decimal>;

    /// `self / denominator × 100`. 분모가 0이면 `None`.
    fn pct_of(&self, denominator: Decimal) -> Option<Percentage>;

    /// 허용 오차 이내로 같은지 확인합니다.
    fn approx_eq(&self, other: Decimal, tolerance: Decimal) -> bool;

    /// bp 값을 비율로 변환합니다 (10bp → 0.001).
    fn bps_to_ratio(&self) -> Decimal;
}

impl DecimalExt for Decimal {
    fn checked_ratio(&self, denominator: Decimal) -> Option<Decimal> {
        if denominator.is_zero() {
            None
        } else {
            self.checked_div(denominator)
        }
    }

    fn pct_of(&self, denominator: Decimal) -> Option<Percentage> {
        self.checked_ratio(denominator).map(|r| r * HUNDRED)
    }

    fn approx_eq(&self, other: Decimal, tolerance: Decimal) -> bool {
        (*self - other).abs() <= tolerance
    }

    fn bps_to_ratio(&self) -> Decimal {
        *self / BPS_DENOMINATOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_ratio_zero_denominator() {
        assert_eq!(dec!(10).checked_ratio(Decimal::ZERO), None);
        assert_eq!(dec!(10).checked_ratio(dec!(4)), Some(dec!(2.5)));
    }

    #[test]
    fn test_pct_of() {
        assert_eq!(dec!(25).pct_of(dec!(200)), Some(dec!(12.5)));
        assert_eq!(dec!(25).pct_of(Decimal::ZERO), None);
    }

    #[test]
    fn test_bps_to_ratio() {
        assert_eq!(dec!(10).bps_to_ratio(), dec!(0.001));
        assert_eq!(dec!(50) * (Decimal::ONE + dec!(10).bps_to_ratio()), dec!(50.05));
    }

    #[test]
    fn test_approx_eq() {
        assert!(dec!(1.000000001).approx_eq(dec!(1), dec!(0.00000001)));
        assert!(!dec!(1.1).approx_eq(dec!(1), dec!(0.00000001)));
    }
}

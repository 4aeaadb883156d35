//! 거래 원장 항목.

use crate::domain::Side;
use crate::types::{Percentage, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 전략 진입 신호에 의한 매수 사유.
pub const STRATEGY_ENTRY: &str = "STRATEGY_ENTRY";

/// 전략 청산 신호에 의한 매도 사유.
pub const STRATEGY_EXIT: &str = "STRATEGY_EXIT";

/// 체결된 가상 거래.
///
/// 생성 후 변경되지 않는 추가 전용 원장 항목입니다. 매도 거래만
/// 실현 손익 관련 필드를 가집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// 거래 ID
    pub id: Uuid,
    /// 백테스트 실행 ID
    pub run_id: Uuid,
    /// 실행 내 원장 순번 (0부터)
    pub sequence: u32,
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 체결 수량
    pub quantity: Quantity,
    /// 신호 가격
    pub target_price: Price,
    /// 슬리피지 반영 체결 가격
    pub executed_price: Price,
    /// 슬리피지 비용 (|체결가 - 신호가| × 수량)
    pub slippage_amount: Decimal,
    /// 수수료
    pub commission: Decimal,
    /// 총 체결 금액 (수량 × 체결가)
    pub gross_amount: Decimal,
    /// 순 금액 (매수: 총액 + 수수료, 매도: 총액 - 수수료)
    pub net_amount: Decimal,
    /// 신호 발생 바
    pub signal_bar: DateTime<Utc>,
    /// 체결 바
    pub execution_bar: DateTime<Utc>,
    /// 진입 또는 청산 사유
    pub reason: String,
    /// 매도 시 평균 진입가
    pub entry_price: Option<Price>,
    /// 매도 시 실현 손익
    pub realized_pl: Option<Decimal>,
    /// 매도 시 실현 손익률 (%)
    pub realized_pl_pct: Option<Percentage>,
    /// 매도 시 보유 기간 (일)
    pub holding_period_days: Option<i64>,
}

impl Trade {
    /// 매도 거래인지 확인합니다.
    pub fn is_sell(&self) -> bool {
        self.side == Side::Sell
    }

    /// 실현 이익이 난 매도인지 확인합니다.
    pub fn is_win(&self) -> bool {
        self.realized_pl.is_some_and(|pl| pl > Decimal::ZERO)
    }

    /// 실현 손실이 난 매도인지 확인합니다.
    pub fn is_loss(&self) -> bool {
        self.realized_pl.is_some_and(|pl| pl < Decimal::ZERO)
    }
}

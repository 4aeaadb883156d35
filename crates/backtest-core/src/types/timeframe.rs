//! 가격 바의 타임프레임과 투자 기간 정의.
//!
//! `TimeHorizon`은 사용자가 선택하는 투자 기간이고, `Timeframe`은
//! 실제로 데이터를 샘플링하는 간격입니다.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 가격 바 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 일봉
    D1,
    /// 주봉
    W1,
}

impl Timeframe {
    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
            Timeframe::W1 => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// 이 타임프레임의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 일봉보다 짧은 분봉/시간봉인지 확인합니다.
    pub fn is_intraday(&self) -> bool {
        self.as_secs() < Timeframe::D1.as_secs()
    }

    /// 캐시 키와 표시용 간격 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Yahoo Finance 간격 문자열로 변환합니다.
    pub fn to_yahoo_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "60m",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1wk",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" | "60m" => Ok(Timeframe::H1),
            "1d" => Ok(Timeframe::D1),
            "1w" | "1wk" => Ok(Timeframe::W1),
            _ => Err(CoreError::Parse(format!("알 수 없는 타임프레임: {}", s))),
        }
    }
}

/// 백테스트 투자 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeHorizon {
    /// 단기 (장중 데이터)
    ShortTerm,
    /// 스윙 (일봉)
    Swing,
    /// 장기 (일봉)
    LongTerm,
}

impl TimeHorizon {
    /// 투자 기간에 맞는 샘플링 간격.
    pub fn timeframe(&self) -> Timeframe {
        match self {
            TimeHorizon::ShortTerm => Timeframe::H1,
            TimeHorizon::Swing | TimeHorizon::LongTerm => Timeframe::D1,
        }
    }

    /// 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeHorizon::ShortTerm => "SHORT_TERM",
            TimeHorizon::Swing => "SWING",
            TimeHorizon::LongTerm => "LONG_TERM",
        }
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeHorizon {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "SHORT_TERM" => Ok(TimeHorizon::ShortTerm),
            "SWING" => Ok(TimeHorizon::Swing),
            "LONG_TERM" => Ok(TimeHorizon::LongTerm),
            _ => Err(CoreError::Parse(format!("알 수 없는 투자 기간: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::M1.as_secs(), 60);
        assert_eq!(Timeframe::H1.as_secs(), 3600);
        assert_eq!(Timeframe::D1.as_secs(), 86400);
    }

    #[test]
    fn test_timeframe_intraday() {
        assert!(Timeframe::H1.is_intraday());
        assert!(!Timeframe::D1.is_intraday());
        assert!(!Timeframe::W1.is_intraday());
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert_eq!("60m".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert_eq!(Timeframe::W1.to_yahoo_interval(), "1wk");
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_horizon_mapping() {
        assert_eq!(TimeHorizon::ShortTerm.timeframe(), Timeframe::H1);
        assert_eq!(TimeHorizon::Swing.timeframe(), Timeframe::D1);
        assert_eq!(TimeHorizon::LongTerm.timeframe(), Timeframe::D1);
    }

    #[test]
    fn test_horizon_parse() {
        assert_eq!("swing".parse::<TimeHorizon>().unwrap(), TimeHorizon::Swing);
        assert_eq!("short-term".parse::<TimeHorizon>().unwrap(), TimeHorizon::ShortTerm);
        assert_eq!("LONG_TERM".parse::<TimeHorizon>().unwrap(), TimeHorizon::LongTerm);
        assert!("forever".parse::<TimeHorizon>().is_err());
    }
}

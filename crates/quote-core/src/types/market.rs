//! 시장 구분 및 심볼 분류.
//!
//! 심볼 문자열만 보고 어느 시장에 속하는지 결정합니다.
//! I/O가 없는 순수 함수이므로 같은 입력에는 항상 같은 시장을 반환합니다.
//!
//! # 분류 규칙 (먼저 일치하는 규칙 적용)
//!
//! | 순서 | 조건 | 시장 |
//! |------|------|------|
//! | 1 | `.HK` 접미사 또는 5자리 숫자 | HK |
//! | 2 | 대문자 1~5자 | US |
//! | 3 | `.SZ` 접미사 또는 `00`/`30` 접두사 | SZ |
//! | 4 | `.SH` 접미사 또는 `60`/`68` 접두사 | SH |
//! | - | 그 외 | US |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 거래 시장.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    /// 미국 시장
    #[serde(rename = "US")]
    Us,
    /// 홍콩 시장
    #[serde(rename = "HK")]
    Hk,
    /// 선전 시장
    #[serde(rename = "SZ")]
    Sz,
    /// 상하이 시장
    #[serde(rename = "SH")]
    Sh,
}

impl Market {
    /// 모든 시장.
    pub fn all() -> [Market; 4] {
        [Market::Us, Market::Hk, Market::Sz, Market::Sh]
    }

    /// 시장 코드 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Hk => "HK",
            Market::Sz => "SZ",
            Market::Sh => "SH",
        }
    }

    /// 백그라운드 갱신 우선순위 가중치 (US > HK > 기타).
    pub fn refresh_weight(&self) -> f64 {
        match self {
            Market::Us => 3.0,
            Market::Hk => 2.0,
            Market::Sz | Market::Sh => 1.0,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "US" => Ok(Market::Us),
            "HK" => Ok(Market::Hk),
            "SZ" => Ok(Market::Sz),
            "SH" => Ok(Market::Sh),
            other => Err(format!("Unknown market: {}", other)),
        }
    }
}

/// 심볼이 속한 시장을 판별합니다.
pub fn classify(symbol: &str) -> Market {
    let upper = symbol.to_ascii_uppercase();

    if upper.ends_with(".HK") || is_digits(symbol, 5) {
        return Market::Hk;
    }

    if (1..=5).contains(&symbol.len()) && symbol.chars().all(|c| c.is_ascii_uppercase()) {
        return Market::Us;
    }

    if upper.ends_with(".SZ") || symbol.starts_with("00") || symbol.starts_with("30") {
        return Market::Sz;
    }

    if upper.ends_with(".SH") || symbol.starts_with("60") || symbol.starts_with("68") {
        return Market::Sh;
    }

    Market::Us
}

/// 정확히 `len`자리 숫자인지 확인.
fn is_digits(symbol: &str, len: usize) -> bool {
    symbol.len() == len && symbol.chars().all(|c| c.is_ascii_digit())
}

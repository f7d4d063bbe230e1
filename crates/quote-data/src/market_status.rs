//! 거래 시간 기반 시장 상태.
//!
//! 각 시장의 현지 시간대로 정규장 시간을 판단합니다. 주말과 설정된 휴장일은
//! 휴장으로 처리하며, 점심 휴장은 구분하지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use quote_core::{CoreResult, Market, MarketStatus, MarketStatusProvider};
use std::collections::HashSet;

/// 시장별 정규장 시간 (현지 시각, 분 단위).
struct TradingSession {
    timezone: Tz,
    open_minutes: u32,
    close_minutes: u32,
}

fn session(market: Market) -> TradingSession {
    match market {
        // 09:30 ~ 16:00 EST
        Market::Us => TradingSession {
            timezone: chrono_tz::America::New_York,
            open_minutes: 9 * 60 + 30,
            close_minutes: 16 * 60,
        },
        // 09:30 ~ 16:00 HKT
        Market::Hk => TradingSession {
            timezone: chrono_tz::Asia::Hong_Kong,
            open_minutes: 9 * 60 + 30,
            close_minutes: 16 * 60,
        },
        // 09:30 ~ 15:00 CST
        Market::Sz | Market::Sh => TradingSession {
            timezone: chrono_tz::Asia::Shanghai,
            open_minutes: 9 * 60 + 30,
            close_minutes: 15 * 60,
        },
    }
}

/// 거래 시간 기반 시장 상태 제공자.
#[derive(Debug, Clone, Default)]
pub struct TradingHoursStatus {
    holidays: HashSet<NaiveDate>,
}

impl TradingHoursStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 휴장일(현지 날짜)을 지정하여 생성합니다.
    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// 주어진 시각의 시장 상태.
    pub fn status_at(&self, market: Market, now: DateTime<Utc>) -> MarketStatus {
        let session = session(market);
        let local = now.with_timezone(&session.timezone);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun)
            || self.holidays.contains(&local.date_naive())
        {
            return MarketStatus::holiday();
        }

        let time_minutes = local.hour() * 60 + local.minute();
        if time_minutes >= session.open_minutes && time_minutes < session.close_minutes {
            MarketStatus::trading()
        } else {
            MarketStatus::closed()
        }
    }
}

#[async_trait]
impl MarketStatusProvider for TradingHoursStatus {
    async fn status(&self, market: Market) -> CoreResult<MarketStatus> {
        Ok(self.status_at(market, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_us_session() {
        let status = TradingHoursStatus::new();

        // 2024-03-13 (수) 15:00 UTC = 11:00 EDT
        assert_eq!(status.status_at(Market::Us, utc(2024, 3, 13, 15, 0)), MarketStatus::trading());
        // 2024-03-13 (수) 21:00 UTC = 17:00 EDT
        assert_eq!(status.status_at(Market::Us, utc(2024, 3, 13, 21, 0)), MarketStatus::closed());
        // 2024-03-16 (토)
        assert_eq!(status.status_at(Market::Us, utc(2024, 3, 16, 15, 0)), MarketStatus::holiday());
    }

    #[test]
    fn test_china_session_closes_at_three() {
        let status = TradingHoursStatus::new();

        // 2024-03-13 02:00 UTC = 10:00 CST
        assert!(status.status_at(Market::Sh, utc(2024, 3, 13, 2, 0)).is_trading);
        // 2024-03-13 07:30 UTC = 15:30 CST
        assert_eq!(status.status_at(Market::Sz, utc(2024, 3, 13, 7, 30)), MarketStatus::closed());
        // 같은 시각 홍콩(15:30 HKT)은 거래 중
        assert!(status.status_at(Market::Hk, utc(2024, 3, 13, 7, 30)).is_trading);
    }

    #[test]
    fn test_configured_holiday() {
        let holiday = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        let status = TradingHoursStatus::with_holidays([holiday]);

        // 2024-12-25 (수) 15:00 UTC = 10:00 EST
        assert_eq!(status.status_at(Market::Us, utc(2024, 12, 25, 15, 0)), MarketStatus::holiday());
        assert!(status.status_at(Market::Us, utc(2024, 12, 24, 15, 0)).is_trading);
    }
}

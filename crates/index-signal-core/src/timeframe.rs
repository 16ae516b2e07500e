use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Asia::Kolkata;
use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// Candle bar size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
        }
    }

    /// The next-candle classifier was trained on 5-minute bars only.
    pub fn classifier_supported(&self) -> bool {
        matches!(self, Interval::FiveMinutes)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            other => Err(SignalError::InvalidData(format!(
                "unknown interval: {other}. Expected: 1m, 5m, 15m"
            ))),
        }
    }
}

/// Wall-clock time at the exchange (India Standard Time), without an offset.
pub fn to_exchange_time(timestamp: &DateTime<Utc>) -> NaiveDateTime {
    timestamp.with_timezone(&Kolkata).naive_local()
}

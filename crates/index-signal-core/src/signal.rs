//! Rule-based trade signal for the latest candle.
//!
//! EMA20/EMA50 give the trend, RSI(14) confirms momentum, ATR(14) sizes the
//! stop-loss and take-profit distances.

use std::fmt;

use serde::Serialize;

use crate::candle::{self, Candle};
use crate::error::SignalError;
use crate::indicators;
use crate::round::round_dp;
use crate::table::Field;

pub const EMA_FAST: usize = 20;
pub const EMA_SLOW: usize = 50;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;

const BUY_RSI_ABOVE: f64 = 55.0;
const SELL_RSI_BELOW: f64 = 45.0;
const TRADE_CONFIDENCE: f64 = 0.65;
const STOP_ATR_MULTIPLE: f64 = 0.7;
const TARGET_ATR_MULTIPLE: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "NO TRADE")]
    NoTrade,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::NoTrade => "NO TRADE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Risk {
    Normal,
    High,
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Decision for the latest candle. Confidence, stop-loss and take-profit are
/// rounded to two decimals; `price` is the raw latest close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResult {
    pub signal: Signal,
    pub confidence: f64,
    pub trend: Trend,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk: Risk,
    pub price: f64,
}

/// Indicator readings on the latest candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestIndicators {
    pub price: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub atr: f64,
    /// Mean of every defined ATR value in the window.
    pub mean_atr: Option<f64>,
}

impl LatestIndicators {
    /// Compute EMA20, EMA50, RSI(14) and ATR(14) over the whole window and
    /// keep the final row.
    pub fn compute(candles: &[Candle]) -> Result<Self, SignalError> {
        let Some(latest) = candles.last() else {
            return Err(SignalError::EmptyInput);
        };
        if !latest.close.is_finite() {
            return Err(SignalError::InvalidPrice { field: Field::Close });
        }

        let closes = candle::closes(candles);
        let ema_fast = indicators::ema(&closes, EMA_FAST)?;
        let ema_slow = indicators::ema(&closes, EMA_SLOW)?;
        let rsi = indicators::rsi(&closes, RSI_PERIOD)?;
        let atr = indicators::atr(
            &candle::highs(candles),
            &candle::lows(candles),
            &closes,
            ATR_PERIOD,
        )?;

        let last = candles.len() - 1;
        Ok(Self {
            price: latest.close,
            ema_fast: ema_fast[last],
            ema_slow: ema_slow[last],
            rsi: rsi[last],
            atr: atr[last],
            mean_atr: indicators::mean_defined(&atr),
        })
    }

    pub fn trend(&self) -> Trend {
        if self.ema_fast > self.ema_slow {
            Trend::Bullish
        } else if self.ema_fast < self.ema_slow {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }

    pub fn risk(&self) -> Risk {
        match self.mean_atr {
            Some(mean) if self.atr > mean => Risk::High,
            _ => Risk::Normal,
        }
    }

    /// Apply the threshold rules. Undefined readings (`NaN`) fail every
    /// comparison and fall through to NO TRADE.
    pub fn decide(&self) -> SignalResult {
        let trend = self.trend();
        let price = self.price;

        let (signal, confidence, stop_loss, take_profit) =
            if self.ema_fast > self.ema_slow && self.rsi > BUY_RSI_ABOVE {
                (
                    Signal::Buy,
                    TRADE_CONFIDENCE,
                    price - self.atr * STOP_ATR_MULTIPLE,
                    price + self.atr * TARGET_ATR_MULTIPLE,
                )
            } else if self.ema_fast < self.ema_slow && self.rsi < SELL_RSI_BELOW {
                (
                    Signal::Sell,
                    TRADE_CONFIDENCE,
                    price + self.atr * STOP_ATR_MULTIPLE,
                    price - self.atr * TARGET_ATR_MULTIPLE,
                )
            } else {
                (Signal::NoTrade, 0.0, 0.0, 0.0)
            };

        SignalResult {
            signal,
            confidence: round_dp(confidence, 2),
            trend,
            stop_loss: round_dp(stop_loss, 2),
            take_profit: round_dp(take_profit, 2),
            risk: self.risk(),
            price,
        }
    }
}

/// Trade signal for the most recent candle of `candles`.
///
/// RSI here is unguarded: a window whose last 14 changes contain no loss
/// yields RSI 100 (or `NaN` when there are no gains either) rather than a
/// smoothed value.
pub fn generate_signal(candles: &[Candle]) -> Result<SignalResult, SignalError> {
    let latest = LatestIndicators::compute(candles)?;
    let result = latest.decide();
    tracing::debug!(
        signal = %result.signal,
        trend = %result.trend,
        rsi = latest.rsi,
        atr = latest.atr,
        "rule engine decision"
    );
    Ok(result)
}

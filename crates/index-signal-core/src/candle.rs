use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::Field;

/// A single OHLCV candle. A price the feed did not report is `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn field(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut f64 {
        match field {
            Field::Open => &mut self.open,
            Field::High => &mut self.high,
            Field::Low => &mut self.low,
            Field::Close => &mut self.close,
            Field::Volume => &mut self.volume,
        }
    }
}

pub fn opens(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.open).collect()
}

pub fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume).collect()
}

/// Synthetic candles from close prices, for tests.
///
/// open = previous close (or close for the first bar), high/low are one point
/// beyond the body, volume = 1000, five minutes apart.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let start = Utc.with_ymd_and_hms(2025, 1, 15, 3, 45, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: start + chrono::Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() <= eps,
        "expected {expected}, got {actual} (eps {eps})"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_candles_links_open_to_previous_close() {
        let candles = make_candles(&[100.0, 102.0, 101.0]);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[1].open, 100.0);
        assert_eq!(candles[2].open, 102.0);
        assert_eq!(candles[1].high, 103.0);
        assert_eq!(candles[2].low, 100.0);
    }

    #[test]
    fn column_extractors_preserve_order() {
        let candles = make_candles(&[1.0, 2.0, 3.0]);
        assert_eq!(closes(&candles), vec![1.0, 2.0, 3.0]);
        assert_eq!(opens(&candles), vec![1.0, 1.0, 2.0]);
        assert_eq!(volumes(&candles), vec![1000.0; 3]);
        assert_eq!(highs(&candles).len(), 3);
        assert_eq!(lows(&candles).len(), 3);
    }
}

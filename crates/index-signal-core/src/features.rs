//! Feature columns the next-candle classifier was trained on.

use crate::candle::{self, Candle};
use crate::error::SignalError;
use crate::fill;
use crate::indicators::{self, RSI_EPSILON};

pub const RSI_PERIOD: usize = 14;
/// Rolling window of the high-low range mean stored as `atr`.
pub const RANGE_MEAN_PERIOD: usize = 14;
pub const VOLATILITY_WINDOW: usize = 10;
pub const MOMENTUM_LAG: usize = 10;

/// Column names in the order [`FeatureFrame::compute`] produces them.
pub const FEATURE_NAMES: [&str; 17] = [
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "return",
    "body",
    "hl_range",
    "co_range",
    "rsi",
    "ema20",
    "ema50",
    "macd",
    "atr",
    "volatility",
    "trend_strength",
    "momentum",
];

/// Named feature columns, each aligned with the candle window they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<(&'static str, Vec<f64>)>,
    len: usize,
}

impl FeatureFrame {
    /// Compute every feature over the candle window.
    pub fn compute(candles: &[Candle]) -> Result<Self, SignalError> {
        let open = candle::opens(candles);
        let high = candle::highs(candles);
        let low = candle::lows(candles);
        let close = candle::closes(candles);
        let volume = candle::volumes(candles);

        let body: Vec<f64> = close.iter().zip(&open).map(|(c, o)| c - o).collect();
        let hl_range: Vec<f64> = high.iter().zip(&low).map(|(h, l)| h - l).collect();
        let returns = indicators::pct_change(&close);

        let ema20 = indicators::ema(&close, 20)?;
        let ema50 = indicators::ema(&close, 50)?;
        let trend_strength: Vec<f64> = ema20.iter().zip(&ema50).map(|(f, s)| f - s).collect();
        let rsi = indicators::rsi_guarded(&close, RSI_PERIOD, RSI_EPSILON)?;
        let macd = indicators::macd(&close)?;
        let atr = indicators::rolling_mean(&hl_range, RANGE_MEAN_PERIOD)?;
        let volatility = indicators::rolling_std(&returns, VOLATILITY_WINDOW)?;
        let momentum = indicators::diff_n(&close, MOMENTUM_LAG);

        let columns = vec![
            ("Open", open),
            ("High", high),
            ("Low", low),
            ("Close", close),
            ("Volume", volume),
            ("return", returns),
            ("body", body.clone()),
            ("hl_range", hl_range),
            ("co_range", body),
            ("rsi", rsi),
            ("ema20", ema20),
            ("ema50", ema50),
            ("macd", macd),
            ("atr", atr),
            ("volatility", volatility),
            ("trend_strength", trend_strength),
            ("momentum", momentum),
        ];
        debug_assert!(columns.iter().map(|(n, _)| *n).eq(FEATURE_NAMES));

        Ok(Self {
            columns,
            len: candles.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(n, _)| *n)
    }

    /// Keep only the most recent `rows` rows.
    pub fn tail(&mut self, rows: usize) {
        if self.len <= rows {
            return;
        }
        let skip = self.len - rows;
        for (_, values) in &mut self.columns {
            values.drain(..skip);
        }
        self.len = rows;
    }

    /// Backward then forward fill every column.
    pub fn fill_gaps(&mut self) {
        for (_, values) in &mut self.columns {
            fill::fill_gaps(values);
        }
    }

    /// Values of the last row, `None` when the frame is empty.
    pub fn latest(&self) -> Option<FeatureRow> {
        let last = self.len.checked_sub(1)?;
        Some(FeatureRow {
            values: self.columns.iter().map(|(n, v)| (*n, v[last])).collect(),
        })
    }
}

/// One row of features keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<(&'static str, f64)>,
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Order the row as `expected` lists its names. Names the row does not
    /// carry are filled with 0.0 and returned alongside the vector.
    pub fn align<'a>(&self, expected: &'a [String]) -> (Vec<f64>, Vec<&'a str>) {
        let mut missing = Vec::new();
        let vector = expected
            .iter()
            .map(|name| {
                self.get(name).unwrap_or_else(|| {
                    missing.push(name.as_str());
                    0.0
                })
            })
            .collect();
        (vector, missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::{assert_approx, make_candles};

    fn sample(len: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..len)
            .map(|i| 22_000.0 + 40.0 * (i as f64 * 0.3).sin() + i as f64)
            .collect();
        make_candles(&closes)
    }

    #[test]
    fn computes_every_named_column_in_order() {
        let frame = FeatureFrame::compute(&sample(80)).unwrap();
        assert_eq!(frame.names().collect::<Vec<_>>(), FEATURE_NAMES.to_vec());
        for name in FEATURE_NAMES {
            assert_eq!(frame.column(name).unwrap().len(), 80);
        }
    }

    #[test]
    fn derived_columns_match_definitions() {
        let candles = sample(80);
        let frame = FeatureFrame::compute(&candles).unwrap();
        let last = 79;
        let c = &candles[last];

        assert_approx(frame.column("body").unwrap()[last], c.close - c.open, 1e-9);
        assert_approx(frame.column("co_range").unwrap()[last], c.close - c.open, 1e-9);
        assert_approx(frame.column("hl_range").unwrap()[last], c.high - c.low, 1e-9);
        assert_approx(
            frame.column("return").unwrap()[last],
            c.close / candles[last - 1].close - 1.0,
            1e-12,
        );
        assert_approx(
            frame.column("momentum").unwrap()[last],
            c.close - candles[last - 10].close,
            1e-9,
        );
        let ema20 = frame.column("ema20").unwrap()[last];
        let ema50 = frame.column("ema50").unwrap()[last];
        assert_approx(frame.column("trend_strength").unwrap()[last], ema20 - ema50, 1e-9);
    }

    #[test]
    fn range_mean_uses_high_low_only() {
        // make_candles ranges are |close - open| + 2
        let candles = make_candles(&[100.0; 20]);
        let frame = FeatureFrame::compute(&candles).unwrap();
        let atr = frame.column("atr").unwrap();
        assert!(atr[12].is_nan());
        assert_approx(atr[13], 2.0, 1e-12);
    }

    #[test]
    fn warm_up_gaps_are_filled() {
        let mut frame = FeatureFrame::compute(&sample(80)).unwrap();
        assert!(frame.column("volatility").unwrap()[0].is_nan());
        frame.fill_gaps();
        for name in FEATURE_NAMES {
            assert!(
                frame.column(name).unwrap().iter().all(|v| !v.is_nan()),
                "{name} still has gaps"
            );
        }
        // backward fill: the first rows take the first computed value
        let vol = frame.column("volatility").unwrap();
        assert_eq!(vol[0], vol[10]);
    }

    #[test]
    fn tail_keeps_most_recent_rows() {
        let candles = sample(250);
        let mut frame = FeatureFrame::compute(&candles).unwrap();
        frame.tail(200);
        assert_eq!(frame.len(), 200);
        assert_eq!(frame.column("Close").unwrap()[0], candles[50].close);
        assert_eq!(frame.latest().unwrap().get("Close"), Some(candles[249].close));
    }

    #[test]
    fn empty_frame_has_no_latest_row() {
        let frame = FeatureFrame {
            columns: Vec::new(),
            len: 0,
        };
        assert!(frame.is_empty());
        assert!(frame.latest().is_none());
    }

    #[test]
    fn align_defaults_unknown_names_to_zero() {
        let frame = FeatureFrame::compute(&sample(80)).unwrap();
        let row = frame.latest().unwrap();
        let expected = vec![
            "rsi".to_string(),
            "vwap".to_string(),
            "Close".to_string(),
        ];
        let (vector, missing) = row.align(&expected);
        assert_eq!(vector.len(), 3);
        assert_eq!(vector[0], row.get("rsi").unwrap());
        assert_eq!(vector[1], 0.0);
        assert_eq!(vector[2], row.get("Close").unwrap());
        assert_eq!(missing, vec!["vwap"]);
    }
}

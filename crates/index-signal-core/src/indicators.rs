//! Indicator series over candle columns.
//!
//! Every function returns a series aligned 1:1 with its input. Positions that
//! fall inside a warm-up window, or whose window contains a missing value, are
//! `NaN`. Values at index `i` depend only on inputs `0..=i`.

use crate::error::IndicatorError;

/// Epsilon added to the average loss by [`rsi_guarded`].
pub const RSI_EPSILON: f64 = 1e-9;

/// Exponential moving average with `alpha = 2 / (span + 1)`.
///
/// Seeded by the first finite observation with no bias adjustment, so
/// `ema[0] == series[0]` for a finite first value. Weights follow absolute
/// positions: a missing value repeats the previous average, and the average
/// keeps decaying by `1 - alpha` for every skipped position, so the next
/// observation gets `alpha / ((1 - alpha)^k + alpha)` of the weight after a
/// gap of `k - 1`. Leading missing values stay `NaN`.
pub fn ema(series: &[f64], span: usize) -> Result<Vec<f64>, IndicatorError> {
    if series.is_empty() {
        return Err(IndicatorError::EmptySeries { indicator: "EMA" });
    }
    if span == 0 {
        return Err(IndicatorError::ZeroPeriod { indicator: "EMA" });
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut result = Vec::with_capacity(series.len());
    let mut prev: Option<f64> = None;
    let mut old_weight = 1.0;

    for &value in series {
        match prev {
            None if !value.is_nan() => prev = Some(value),
            None => {}
            Some(p) => {
                old_weight *= 1.0 - alpha;
                if !value.is_nan() {
                    // an unchanged value must not drift by rounding
                    if value != p {
                        prev = Some((old_weight * p + alpha * value) / (old_weight + alpha));
                    }
                    old_weight = 1.0;
                }
            }
        }
        result.push(prev.unwrap_or(f64::NAN));
    }

    Ok(result)
}

/// Simple rolling mean. Needs `window` consecutive non-`NaN` values.
pub fn rolling_mean(series: &[f64], window: usize) -> Result<Vec<f64>, IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::ZeroPeriod {
            indicator: "rolling mean",
        });
    }

    Ok(rolling(series, window, |w| {
        w.iter().sum::<f64>() / window as f64
    }))
}

/// Rolling sample standard deviation (denominator `window - 1`).
/// A window of 1 has no spread estimate and yields `NaN`.
pub fn rolling_std(series: &[f64], window: usize) -> Result<Vec<f64>, IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::ZeroPeriod {
            indicator: "rolling std",
        });
    }

    Ok(rolling(series, window, |w| {
        if w.len() < 2 {
            return f64::NAN;
        }
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
        var.sqrt()
    }))
}

fn rolling(series: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut result = vec![f64::NAN; series.len()];
    if series.len() < window {
        return result;
    }

    for end in window..=series.len() {
        let slice = &series[end - window..end];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[end - 1] = f(slice);
    }
    result
}

/// One-step change `x[i] - x[i-1]`; the first entry is `NaN`.
pub fn diff(series: &[f64]) -> Vec<f64> {
    diff_n(series, 1)
}

/// `x[i] - x[i-n]`; the first `n` entries are `NaN`. Used for momentum.
pub fn diff_n(series: &[f64], n: usize) -> Vec<f64> {
    (0..series.len())
        .map(|i| {
            if i < n {
                f64::NAN
            } else {
                series[i] - series[i - n]
            }
        })
        .collect()
}

/// Fractional change `x[i] / x[i-1] - 1`; the first entry is `NaN`.
pub fn pct_change(series: &[f64]) -> Vec<f64> {
    (0..series.len())
        .map(|i| {
            if i == 0 {
                f64::NAN
            } else {
                series[i] / series[i - 1] - 1.0
            }
        })
        .collect()
}

/// Relative Strength Index with simple rolling averages of gains and losses.
///
/// RSI = 100 - 100 / (1 + avg_gain / avg_loss). The first change is undefined,
/// so the first value lands at index `period`.
///
/// No guard against a zero average loss: with gains and no losses the ratio
/// is infinite and RSI is 100; with neither gains nor losses the result is
/// `NaN`. Callers that need a finite value use [`rsi_guarded`].
pub fn rsi(series: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod { indicator: "RSI" });
    }

    let changes = diff(series);
    let gains: Vec<f64> = changes
        .iter()
        .map(|&c| if c.is_nan() { c } else { c.max(0.0) })
        .collect();
    let losses: Vec<f64> = changes
        .iter()
        .map(|&c| if c.is_nan() { c } else { (-c).max(0.0) })
        .collect();

    let avg_gain = rolling_mean(&gains, period)?;
    let avg_loss = rolling_mean(&losses, period)?;

    Ok(avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| 100.0 - 100.0 / (1.0 + g / l))
        .collect())
}

/// RSI as the next-candle classifier was trained on it.
///
/// Differs from [`rsi`] in two ways: an undefined change (the first one)
/// counts as neither gain nor loss, so values start at index `period - 1`;
/// and `eps` is added to the average loss so the ratio stays finite.
pub fn rsi_guarded(series: &[f64], period: usize, eps: f64) -> Result<Vec<f64>, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod { indicator: "RSI" });
    }

    let changes = diff(series);
    let gains: Vec<f64> = changes
        .iter()
        .map(|&c| if c > 0.0 { c } else { 0.0 })
        .collect();
    let losses: Vec<f64> = changes
        .iter()
        .map(|&c| if c < 0.0 { -c } else { 0.0 })
        .collect();

    let avg_gain = rolling_mean(&gains, period)?;
    let avg_loss = rolling_mean(&losses, period)?;

    Ok(avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| 100.0 - 100.0 / (1.0 + g / (l + eps)))
        .collect())
}

/// True range: max(high-low, |high-prev_close|, |low-prev_close|).
///
/// The first bar has no previous close and uses high-low. Missing terms are
/// skipped; a bar with no usable term is `NaN`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    (0..n)
        .map(|i| {
            let h = high[i];
            let l = low[i];
            let mut terms = vec![h - l];
            if i > 0 {
                let pc = close[i - 1];
                terms.push((h - pc).abs());
                terms.push((l - pc).abs());
            }
            terms
                .into_iter()
                .filter(|t| !t.is_nan())
                .fold(f64::NAN, f64::max)
        })
        .collect()
}

/// Average True Range: simple rolling mean of [`true_range`] over `period`.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod { indicator: "ATR" });
    }
    rolling_mean(&true_range(high, low, close), period)
}

/// MACD line: EMA(12) - EMA(26).
pub fn macd(series: &[f64]) -> Result<Vec<f64>, IndicatorError> {
    let fast = ema(series, 12)?;
    let slow = ema(series, 26)?;
    Ok(fast.iter().zip(&slow).map(|(f, s)| f - s).collect())
}

/// Mean of the defined (non-`NaN`) entries, `None` if there are none.
pub fn mean_defined(series: &[f64]) -> Option<f64> {
    let defined: Vec<f64> = series.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::{self, assert_approx, make_candles};

    const EPS: f64 = 1e-9;

    #[test]
    fn ema_seeds_with_first_value_and_keeps_length() {
        let series = [10.0, 11.0, 12.0, 13.0, 14.0];
        let result = ema(&series, 3).unwrap();
        assert_eq!(result.len(), series.len());
        assert_eq!(result[0], 10.0);
        // alpha = 0.5
        assert_approx(result[1], 10.5, EPS);
        assert_approx(result[2], 11.25, EPS);
        assert_approx(result[3], 12.125, EPS);
        assert_approx(result[4], 13.0625, EPS);
    }

    #[test]
    fn ema_of_constant_series_is_exact() {
        let result = ema(&[100.0; 60], 20).unwrap();
        assert!(result.iter().all(|v| *v == 100.0));
    }

    #[test]
    fn ema_span_one_equals_input() {
        let series = [100.0, 200.0, 300.0];
        assert_eq!(ema(&series, 1).unwrap(), series.to_vec());
    }

    #[test]
    fn ema_empty_series_is_error() {
        assert_eq!(
            ema(&[], 20),
            Err(IndicatorError::EmptySeries { indicator: "EMA" })
        );
        assert_eq!(
            ema(&[1.0], 0),
            Err(IndicatorError::ZeroPeriod { indicator: "EMA" })
        );
    }

    #[test]
    fn ema_carries_through_gap_and_skips_leading_gap() {
        let result = ema(&[f64::NAN, 10.0, f64::NAN, 14.0], 3).unwrap();
        assert!(result[0].is_nan());
        assert_eq!(result[1], 10.0);
        assert_eq!(result[2], 10.0);
        // the skipped bar still decays the old average: 9.5 / 0.75
        assert_approx(result[3], 12.0 + 2.0 / 3.0, EPS);
    }

    #[test]
    fn ema_after_gap_weights_by_position() {
        // span 9: alpha 0.2, two skipped bars leave (0.8)^3 on the old average
        let result = ema(&[100.0, f64::NAN, f64::NAN, 110.0, 110.0], 9).unwrap();
        assert_eq!(result[1], 100.0);
        assert_eq!(result[2], 100.0);
        let w = 0.8f64.powi(3);
        let expected = (w * 100.0 + 0.2 * 110.0) / (w + 0.2);
        assert_approx(result[3], expected, EPS);
        assert_approx(result[4], 0.8 * expected + 0.2 * 110.0, EPS);
    }

    #[test]
    fn ema_has_no_lookahead() {
        let series: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let full = ema(&series, 20).unwrap();
        let prefix = ema(&series[..30], 20).unwrap();
        for i in 0..30 {
            assert_eq!(full[i], prefix[i]);
        }
    }

    #[test]
    fn rolling_mean_warm_up() {
        let result = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 2.0, EPS);
        assert_approx(result[3], 3.0, EPS);
    }

    #[test]
    fn rolling_mean_nan_in_window() {
        let result = rolling_mean(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2).unwrap();
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], 3.5, EPS);
        assert_approx(result[4], 4.5, EPS);
    }

    #[test]
    fn rolling_std_is_sample_std() {
        // mean 5, squared deviations sum 32 over 8 values -> sample var 32/7
        let series = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let result = rolling_std(&series, 8).unwrap();
        assert_approx(result[7], (32.0f64 / 7.0).sqrt(), EPS);
    }

    #[test]
    fn rolling_std_window_one_is_nan() {
        let result = rolling_std(&[1.0, 2.0], 1).unwrap();
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn diff_n_and_pct_change() {
        let series = [100.0, 110.0, 99.0, 120.0];
        let d = diff_n(&series, 2);
        assert!(d[0].is_nan() && d[1].is_nan());
        assert_approx(d[2], -1.0, EPS);
        assert_approx(d[3], 10.0, EPS);

        let p = pct_change(&series);
        assert!(p[0].is_nan());
        assert_approx(p[1], 0.1, EPS);
        assert_approx(p[2], -0.1, EPS);
    }

    #[test]
    fn rsi_first_value_at_period() {
        let series = [44.0, 44.34, 44.09, 43.61, 44.33];
        let result = rsi(&series, 3).unwrap();
        assert!(result[..3].iter().all(|v| v.is_nan()));
        // gains 0.34, losses 0.73 over the first three changes
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        assert_approx(result[3], expected, 1e-9);
    }

    #[test]
    fn rsi_bounded_when_losses_present() {
        let series = [100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0, 101.0];
        let result = rsi(&series, 3).unwrap();
        for (i, v) in result.iter().enumerate().filter(|(_, v)| !v.is_nan()) {
            assert!((0.0..=100.0).contains(v), "RSI out of bounds at {i}: {v}");
        }
    }

    #[test]
    fn rsi_without_losses_is_unguarded() {
        let rising = rsi(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert_eq!(rising[4], 100.0);

        let flat = rsi(&[5.0; 6], 3).unwrap();
        assert!(flat[5].is_nan());
    }

    #[test]
    fn rsi_guarded_stays_finite_and_starts_earlier() {
        let flat = rsi_guarded(&[5.0; 6], 3, RSI_EPSILON).unwrap();
        assert!(flat[..2].iter().all(|v| v.is_nan()));
        assert_approx(flat[2], 0.0, EPS);
        assert!(flat[2..].iter().all(|v| v.is_finite()));

        let rising = rsi_guarded(&[1.0, 2.0, 3.0, 4.0, 5.0], 3, RSI_EPSILON).unwrap();
        assert!(rising[4] < 100.0 && rising[4] > 99.99);
    }

    #[test]
    fn true_range_uses_previous_close() {
        let high = [10.0, 12.0, 11.0];
        let low = [9.0, 11.5, 8.0];
        let close = [9.5, 11.8, 10.0];
        let tr = true_range(&high, &low, &close);
        assert_approx(tr[0], 1.0, EPS);
        // gap up: |12 - 9.5| dominates
        assert_approx(tr[1], 2.5, EPS);
        // range 3 vs |11-11.8| and |8-11.8| = 3.8
        assert_approx(tr[2], 3.8, EPS);
    }

    #[test]
    fn atr_is_never_negative() {
        let candles = make_candles(&[100.0, 98.0, 103.0, 97.0, 99.0, 104.0, 101.0, 100.0]);
        let result = atr(
            &candle::highs(&candles),
            &candle::lows(&candles),
            &candle::closes(&candles),
            3,
        )
        .unwrap();
        assert!(result[..2].iter().all(|v| v.is_nan()));
        assert!(result[2..].iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn macd_is_fast_minus_slow() {
        let series: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let line = macd(&series).unwrap();
        let fast = ema(&series, 12).unwrap();
        let slow = ema(&series, 26).unwrap();
        assert_eq!(line[0], 0.0);
        assert_approx(line[39], fast[39] - slow[39], EPS);
        // rising series: fast average leads the slow one
        assert!(line[39] > 0.0);
    }

    #[test]
    fn mean_defined_skips_nan() {
        assert_eq!(mean_defined(&[f64::NAN, 2.0, 4.0]), Some(3.0));
        assert_eq!(mean_defined(&[f64::NAN]), None);
    }
}

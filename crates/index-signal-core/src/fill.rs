//! Gap filling for candle windows and feature columns.

use crate::candle::Candle;
use crate::table::Field;

/// Replace each `NaN` with the next non-`NaN` value after it.
/// Trailing gaps are left as they are.
pub fn backward_fill(values: &mut [f64]) {
    let mut next = f64::NAN;
    for v in values.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
}

/// Replace each `NaN` with the last non-`NaN` value before it.
/// Leading gaps are left as they are.
pub fn forward_fill(values: &mut [f64]) {
    let mut prev = f64::NAN;
    for v in values.iter_mut() {
        if v.is_nan() {
            *v = prev;
        } else {
            prev = *v;
        }
    }
}

/// Backward fill, then forward fill. Leaves no `NaN` as long as the column
/// has at least one value.
pub fn fill_gaps(values: &mut [f64]) {
    backward_fill(values);
    forward_fill(values);
}

/// Apply [`fill_gaps`] to every field of an owned candle window.
pub fn fill_candle_gaps(candles: &mut [Candle]) {
    for field in Field::ALL {
        let mut column: Vec<f64> = candles.iter().map(|c| c.field(field)).collect();
        fill_gaps(&mut column);
        for (candle, value) in candles.iter_mut().zip(column) {
            *candle.field_mut(field) = value;
        }
    }
}

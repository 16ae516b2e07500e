use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round to `dp` decimal places, half to even, on the exact binary value of
/// `value` (so 2.675, stored as 2.67499..., rounds to 2.67).
/// Non-finite and out-of-range values are returned unchanged.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Percentage with two decimals, e.g. 0.6543 -> 65.43.
pub fn percent(fraction: f64) -> f64 {
    round_dp(fraction * 100.0, 2)
}

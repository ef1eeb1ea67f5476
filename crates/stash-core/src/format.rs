use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to cents, halves away from zero, on the shortest decimal form of
/// `value` (so `42.505` rounds up even though its binary form sits just below).
pub fn round_to_cents(value: f64) -> Option<Decimal> {
    let decimal = Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64_retain(value))?;
    Some(decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Renders an amount with exactly two decimals, e.g. `42.51` or `-3.00`.
pub fn format_amount(value: f64) -> String {
    match round_to_cents(value) {
        Some(rounded) => format!("{rounded:.2}"),
        None => format!("{value:.2}"),
    }
}

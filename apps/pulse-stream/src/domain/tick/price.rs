//! Price Normalization
//!
//! Processed ticks carry prices at a fixed precision. Consumers downstream of
//! the processor must not re-round.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on processed prices.
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// Round a price to [`PRICE_DECIMAL_PLACES`], with midpoints rounded up.
///
/// Validated prices are strictly positive, so rounding midpoints away from
/// zero is half-up.
///
/// ```rust
/// use std::str::FromStr;
/// use rust_decimal::Decimal;
/// use pulse_stream::domain::tick::normalize_price;
///
/// let price = Decimal::from_str("50000.456").unwrap();
/// assert_eq!(normalize_price(price), Decimal::from_str("50000.46").unwrap());
/// ```
#[must_use]
pub fn normalize_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(PRICE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

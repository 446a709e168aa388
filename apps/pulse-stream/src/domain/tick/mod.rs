//! Tick Rules
//!
//! Acceptance rules for received ticks and the price precision contract for
//! processed ticks.

mod price;
mod validation;

pub use price::{PRICE_DECIMAL_PLACES, normalize_price};
pub use validation::{TickValidator, ValidationResult};

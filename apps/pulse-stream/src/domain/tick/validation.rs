//! Tick Validation
//!
//! Stateless, rule-based acceptance filter for received ticks. Every rule is
//! evaluated so callers can report all violations at once.

use rust_decimal::Decimal;

use crate::domain::events::TickReceived;

/// A single acceptance rule.
struct TickRule {
    check: fn(&TickReceived) -> bool,
    message: &'static str,
}

/// Rules in reporting order.
const RULES: &[TickRule] = &[
    TickRule {
        check: has_symbol,
        message: "Symbol cannot be empty",
    },
    TickRule {
        check: has_positive_price,
        message: "Price must be greater than 0",
    },
    TickRule {
        check: has_valid_timestamp,
        message: "Timestamp must be valid",
    },
    TickRule {
        check: has_exchange,
        message: "Exchange cannot be empty",
    },
];

fn has_symbol(tick: &TickReceived) -> bool {
    !tick.symbol.trim().is_empty()
}

fn has_positive_price(tick: &TickReceived) -> bool {
    tick.price > Decimal::ZERO
}

// Non-positive timestamps are invalid, zero included.
const fn has_valid_timestamp(tick: &TickReceived) -> bool {
    tick.timestamp > 0
}

fn has_exchange(tick: &TickReceived) -> bool {
    !tick.exchange.trim().is_empty()
}

/// Outcome of validating one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether every rule passed.
    pub is_valid: bool,
    /// Violated rule messages, in rule order.
    pub errors: Vec<&'static str>,
}

/// Validator for [`TickReceived`] events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickValidator;

impl TickValidator {
    /// Create a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate a tick against every rule.
    #[must_use]
    pub fn validate(&self, tick: &TickReceived) -> ValidationResult {
        let errors: Vec<_> = RULES
            .iter()
            .filter(|rule| !(rule.check)(tick))
            .map(|rule| rule.message)
            .collect();

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

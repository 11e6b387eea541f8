//! Money - Exact fixed-point decimal for balances and amounts
//!
//! All monetary values in Demobank are decimals with 4 fractional digits,
//! stored and transmitted as text. Binary floating point is never used.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed number of fractional digits carried by every stored value.
pub const SCALE: u32 = 4;

/// Errors that can occur when parsing or validating monetary values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Not a valid decimal amount: {0}")]
    Unparseable(String),

    #[error("Amount must be positive: {0}")]
    NotPositive(Decimal),

    #[error("Amount exceeds the single-operation limit of {limit}: {amount}")]
    AboveLimit { amount: Decimal, limit: Decimal },

    #[error("Amount arithmetic overflowed")]
    Overflow,
}

/// An exact monetary value with a fixed scale of 4 fractional digits.
///
/// Values are rounded half-away-from-zero to 4 decimal places on
/// construction, so `25.50` and `25.5000` compare equal and render as
/// `25.5000`. Balances may be negative (administrative overrides can drive
/// them below zero); per-operation amounts are validated separately with
/// [`Money::require_operation_amount`].
///
/// # Example
/// ```
/// use demobank_core::Money;
///
/// let amount: Money = "25.50".parse().unwrap();
/// assert_eq!(amount.to_string(), "25.5000");
/// assert!(amount.require_operation_amount().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Money {
    /// Zero value constant
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest amount a single deposit, withdrawal or admin entry may carry.
    pub const OPERATION_LIMIT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

    /// Create a Money value from a Decimal, rounding to 4 fractional digits.
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Get the inner Decimal value
    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Check if the value is zero
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if the value is below zero
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Checked addition - None on overflow
    pub fn checked_add(&self, other: &Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money::new)
    }

    /// Checked subtraction - None on overflow
    pub fn checked_sub(&self, other: &Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money::new)
    }

    /// Validate this value as a single-operation amount.
    ///
    /// Amounts must lie in `(0, 1_000_000]`. Balances are exempt from this
    /// bound; it applies to what one deposit, withdrawal request or admin
    /// entry may move.
    pub fn require_operation_amount(&self) -> Result<(), MoneyError> {
        if self.0 <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(self.0));
        }
        if self.0 > Self::OPERATION_LIMIT {
            return Err(MoneyError::AboveLimit {
                amount: self.0,
                limit: Self::OPERATION_LIMIT,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Canonical text always carries 4 fractional digits, like the
        // stored form.
        let mut value = self.0;
        value.rescale(SCALE);
        write!(f, "{}", value)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| MoneyError::Unparseable(s.to_string()))?;
        Ok(Self::new(value))
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

//! Money type with exact cent precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are held as a signed count of cents and every arithmetic
//! operation is checked. `rust_decimal::Decimal` is the exchange format
//! at the edges (parsing, display, serialization).

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fraction digits carried by every amount.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Errors produced when converting external input into [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The input is not a plain decimal number.
    #[error("Malformed amount: '{0}'")]
    Malformed(String),

    /// The input carries non-zero digits below one cent.
    #[error("Amount {0} has more than two decimal places")]
    TooPrecise(Decimal),

    /// The input does not fit the supported range.
    #[error("Amount is out of range")]
    Overflow,
}

/// A monetary amount in the shop's single currency.
///
/// Internally a signed number of cents, so repeated additions of values
/// like `0.10` never drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self { cents: 0 };

    /// Creates an amount from a count of cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns the amount as a count of cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.cents
    }

    /// Converts an exact decimal into money.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooPrecise`] if the value has non-zero digits
    /// below one cent and [`MoneyError::Overflow`] if it does not fit.
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        let normalized = amount.normalize();
        if normalized.scale() > MINOR_UNIT_SCALE {
            return Err(MoneyError::TooPrecise(amount));
        }

        let cents = normalized
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::Overflow)?;
        let cents = i64::try_from(cents).map_err(|_| MoneyError::Overflow)?;
        Ok(Self { cents })
    }

    /// Returns the amount as a decimal with two fraction digits.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.cents, MINOR_UNIT_SCALE)
    }

    /// Parses a canonical decimal string such as `"12.50"` or `"-3"`.
    ///
    /// Exponents, thousands separators and comma decimal separators are
    /// rejected; see [`Money::parse_localized`] for the latter.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the text is not an exact cent amount.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let trimmed = input.trim();
        let well_formed = !trimmed.is_empty()
            && trimmed
                .strip_prefix(['-', '+'])
                .unwrap_or(trimmed)
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.')
            && trimmed.chars().filter(|&c| c == '.').count() <= 1
            && trimmed.chars().any(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(MoneyError::Malformed(input.to_string()));
        }

        let amount =
            Decimal::from_str(trimmed).map_err(|_| MoneyError::Malformed(input.to_string()))?;
        Self::from_decimal(amount)
    }

    /// Parses user input that may use a comma as decimal separator (`"12,50"`).
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the normalized text is not an exact cent amount.
    pub fn parse_localized(input: &str) -> Result<Self, MoneyError> {
        let trimmed = input.trim();
        if trimmed.contains(',') && trimmed.contains('.') {
            return Err(MoneyError::Malformed(input.to_string()));
        }
        Self::parse(&trimmed.replace(',', "."))
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.cents < 0
    }

    /// Adds two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.cents.checked_add(other.cents) {
            Some(cents) => Some(Self { cents }),
            None => None,
        }
    }

    /// Subtracts two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.cents.checked_sub(other.cents) {
            Some(cents) => Some(Self { cents }),
            None => None,
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, quantity: i64) -> Option<Self> {
        match self.cents.checked_mul(quantity) {
            Some(cents) => Some(Self { cents }),
            None => None,
        }
    }

    /// Negates the amount, returning `None` on overflow.
    #[must_use]
    pub const fn checked_neg(self) -> Option<Self> {
        match self.cents.checked_neg() {
            Some(cents) => Some(Self { cents }),
            None => None,
        }
    }

    /// Returns the absolute amount, returning `None` on overflow.
    #[must_use]
    pub const fn checked_abs(self) -> Option<Self> {
        match self.cents.checked_abs() {
            Some(cents) => Some(Self { cents }),
            None => None,
        }
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.to_decimal()
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_repeated_dimes_do_not_drift() {
        let dime = Money::parse("0.10").unwrap();
        let total = (0..10).try_fold(Money::ZERO, |acc, _| acc.checked_add(dime));
        assert_eq!(total, Some(Money::from_cents(100)));

        let ten_ten = Money::parse("10.10").unwrap();
        let total = (0..3).try_fold(Money::ZERO, |acc, _| acc.checked_add(ten_ten));
        assert_eq!(total.unwrap().to_string(), "30.30");
    }

    #[rstest]
    #[case("12.50", 1250)]
    #[case("12.5", 1250)]
    #[case("0.01", 1)]
    #[case("-3", -300)]
    #[case(" 5.10 ", 510)]
    #[case("1.230", 123)]
    fn test_parse_accepts_exact_amounts(#[case] input: &str, #[case] cents: i64) {
        assert_eq!(Money::parse(input).unwrap().cents(), cents);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("1e3")]
    #[case("12,50")]
    #[case("1.2.3")]
    #[case("1 000")]
    #[case("-")]
    #[case(".")]
    #[case("NaN")]
    fn test_parse_rejects_malformed(#[case] input: &str) {
        assert!(matches!(Money::parse(input), Err(MoneyError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_sub_cent_digits() {
        assert!(matches!(
            Money::parse("0.105"),
            Err(MoneyError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_from_decimal_overflow() {
        assert_eq!(Money::from_decimal(Decimal::MAX), Err(MoneyError::Overflow));
    }

    #[rstest]
    #[case("12,50", 1250)]
    #[case("12.50", 1250)]
    #[case("7", 700)]
    fn test_parse_localized(#[case] input: &str, #[case] cents: i64) {
        assert_eq!(Money::parse_localized(input).unwrap().cents(), cents);
    }

    #[test]
    fn test_parse_localized_rejects_mixed_separators() {
        assert!(Money::parse_localized("1.234,50").is_err());
    }

    #[test]
    fn test_display_always_has_two_digits() {
        assert_eq!(Money::from_cents(2000).to_string(), "20.00");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_decimal_round_trip() {
        let money = Money::from_decimal(dec!(30.30)).unwrap();
        assert_eq!(money.to_decimal(), dec!(30.30));
    }

    #[test]
    fn test_checked_arithmetic() {
        let max = Money::from_cents(i64::MAX);
        assert!(max.checked_add(Money::from_cents(1)).is_none());
        assert!(Money::from_cents(i64::MIN).checked_neg().is_none());
        assert_eq!(
            Money::from_cents(1000).checked_mul(3),
            Some(Money::from_cents(3000))
        );
        assert_eq!(
            Money::from_cents(-250).checked_abs(),
            Some(Money::from_cents(250))
        );
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert!(Money::ZERO.is_zero());
        assert!(!Money::ZERO.is_positive());
    }

    #[test]
    fn test_serde_uses_decimal_text() {
        let json = serde_json::to_string(&Money::from_cents(1010)).unwrap();
        assert_eq!(json, "\"10.10\"");

        let back: Money = serde_json::from_str("\"10.10\"").unwrap();
        assert_eq!(back, Money::from_cents(1010));

        assert!(serde_json::from_str::<Money>("\"10.101\"").is_err());
    }
}

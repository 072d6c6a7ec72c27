//! Currency-aware money value object.

use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by money arithmetic and construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The currency code is not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// Two amounts in different currencies were combined.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// A price or amount would be negative.
    #[error("Amount cannot be negative: {amount}")]
    Negative { amount: Decimal },

    /// The amount is not a valid decimal number.
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    /// The result does not fit in a decimal.
    #[error("Amount overflow")]
    Overflow,
}

/// ISO 4217 currency code, stored uppercased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Bahraini dinar.
    pub const BHD: Currency = Currency(*b"BHD");

    /// Parses a three-letter code, case-insensitively.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let code = code.trim();
        match code.as_bytes() {
            [a, b, c] if code.chars().all(|ch| ch.is_ascii_alphabetic()) => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(MoneyError::InvalidCurrency(code.to_string())),
        }
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_string()
    }
}

/// A non-negative decimal amount in a single currency.
///
/// Every operation returns a new value. Combining amounts in different
/// currencies fails with [`MoneyError::CurrencyMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMoney")]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

#[derive(Deserialize)]
struct RawMoney {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<RawMoney> for Money {
    type Error = MoneyError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, raw.currency)
    }
}

impl Money {
    /// Creates a money amount. Negative amounts are rejected.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative { amount });
        }
        Ok(Self { amount, currency })
    }

    /// Parses an amount such as `"100.500"` in the given currency code.
    pub fn parse(amount: &str, currency: &str) -> Result<Self, MoneyError> {
        let value = Decimal::from_str(amount.trim())
            .map_err(|_| MoneyError::InvalidAmount(amount.to_string()))?;
        Self::new(value, Currency::new(currency)?)
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(())
    }

    /// Adds another amount in the same currency.
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Money { amount, ..*self })
    }

    /// Subtracts another amount in the same currency. The result may not be negative.
    pub fn checked_sub(&self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Money::new(amount, self.currency)
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Result<Money, MoneyError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Money { amount, ..*self })
    }

    /// Compares two amounts in the same currency.
    pub fn checked_cmp(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Sums amounts, starting from zero in `currency`.
    pub fn sum<'a>(
        currency: Currency,
        amounts: impl IntoIterator<Item = &'a Money>,
    ) -> Result<Money, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |total, amount| total.checked_add(*amount))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bhd(amount: &str) -> Money {
        Money::parse(amount, "BHD").unwrap()
    }

    #[test]
    fn currency_is_normalized_to_uppercase() {
        let currency = Currency::new(" bhd ").unwrap();
        assert_eq!(currency.as_str(), "BHD");
        assert_eq!(currency, "BHD".parse().unwrap());
    }

    #[test]
    fn currency_rejects_bad_codes() {
        for code in ["", "US", "USDT", "U$D", "12A"] {
            assert!(
                matches!(Currency::new(code), Err(MoneyError::InvalidCurrency(_))),
                "{code} should be rejected"
            );
        }
    }

    #[test]
    fn negative_amount_is_rejected() {
        let result = Money::parse("-1", "BHD");
        assert!(matches!(result, Err(MoneyError::Negative { .. })));
        assert!(Money::parse("0", "BHD").unwrap().is_zero());
    }

    #[test]
    fn arithmetic_in_same_currency() {
        let a = bhd("100.250");
        let b = bhd("50.125");

        assert_eq!(a.checked_add(b).unwrap(), bhd("150.375"));
        assert_eq!(a.checked_sub(b).unwrap(), bhd("50.125"));
        assert_eq!(a.multiply(2).unwrap(), bhd("200.5"));
        assert_eq!(a.checked_cmp(&b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn subtraction_below_zero_fails() {
        let result = bhd("1").checked_sub(bhd("2"));
        assert!(matches!(result, Err(MoneyError::Negative { .. })));
    }

    #[test]
    fn mixing_currencies_fails() {
        let usd = Money::parse("1", "USD").unwrap();
        let result = bhd("1").checked_add(usd);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch { .. })));
        assert!(bhd("1").checked_cmp(&usd).is_err());
    }

    #[test]
    fn sum_of_nothing_is_zero() {
        let currency = Currency::new("BHD").unwrap();
        let total = Money::sum(currency, []).unwrap();
        assert!(total.is_zero());
        assert_eq!(total.currency(), currency);
    }

    #[test]
    fn display_includes_currency() {
        assert_eq!(bhd("200.000").to_string(), "200 BHD");
        assert_eq!(bhd("12.5").to_string(), "12.5 BHD");
    }

    #[test]
    fn serialization_keeps_currency_code() {
        let money = bhd("99.990");
        let json = serde_json::to_value(money).unwrap();
        assert_eq!(json["currency"], "BHD");

        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, money);

        let bad = serde_json::json!({ "amount": "1", "currency": "B1" });
        assert!(serde_json::from_value::<Money>(bad).is_err());

        let negative = serde_json::json!({ "amount": "-5", "currency": "BHD" });
        assert!(serde_json::from_value::<Money>(negative).is_err());
    }
}

//! Human-readable order numbers: `PREFIX-YYYY-NNNNNN`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest sequence that fits the six-digit suffix.
pub const MAX_SEQUENCE: u32 = 999_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderNumberError {
    #[error("Invalid order number: {0:?}")]
    InvalidFormat(String),

    /// All six-digit sequences of a year are used up.
    #[error("Order number sequence exhausted for {prefix}-{year}")]
    SequenceExhausted { prefix: OrderNumberPrefix, year: i32 },
}

/// Which kind of document a number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderNumberPrefix {
    Order,
    Appointment,
}

impl OrderNumberPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderNumberPrefix::Order => "ORD",
            OrderNumberPrefix::Appointment => "APT",
        }
    }
}

impl std::fmt::Display for OrderNumberPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderNumberPrefix {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORD" => Ok(OrderNumberPrefix::Order),
            "APT" => Ok(OrderNumberPrefix::Appointment),
            other => Err(OrderNumberError::InvalidFormat(other.to_string())),
        }
    }
}

// Prefixes sort by their code.
impl PartialOrd for OrderNumberPrefix {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderNumberPrefix {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/// A year-scoped sequential business identifier.
///
/// Numbers sort lexicographically in issue order within a prefix and year,
/// so the highest stored key determines the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber {
    prefix: OrderNumberPrefix,
    year: i32,
    sequence: u32,
}

impl OrderNumber {
    pub fn new(prefix: OrderNumberPrefix, year: i32, sequence: u32) -> Result<Self, OrderNumberError> {
        if !(1..=MAX_SEQUENCE).contains(&sequence) || !(0..=9999).contains(&year) {
            return Err(OrderNumberError::InvalidFormat(format!(
                "{prefix}-{year}-{sequence}"
            )));
        }
        Ok(Self {
            prefix,
            year,
            sequence,
        })
    }

    /// The first number of a year.
    pub fn first(prefix: OrderNumberPrefix, year: i32) -> Result<Self, OrderNumberError> {
        Self::new(prefix, year, 1)
    }

    /// Returns the number following `previous`, or the first of the year if
    /// there is none or it belongs to another prefix or year.
    pub fn next_after(
        prefix: OrderNumberPrefix,
        year: i32,
        previous: Option<&OrderNumber>,
    ) -> Result<Self, OrderNumberError> {
        match previous {
            Some(prev) if prev.prefix == prefix && prev.year == year => {
                if prev.sequence >= MAX_SEQUENCE {
                    return Err(OrderNumberError::SequenceExhausted { prefix, year });
                }
                Self::new(prefix, year, prev.sequence + 1)
            }
            _ => Self::first(prefix, year),
        }
    }

    /// The key prefix shared by all numbers of a year, e.g. `ORD-2026-`.
    pub fn year_prefix(prefix: OrderNumberPrefix, year: i32) -> String {
        format!("{prefix}-{year:04}-")
    }

    pub fn prefix(&self) -> OrderNumberPrefix {
        self.prefix
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:04}-{:06}", self.prefix, self.year, self.sequence)
    }
}

impl FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OrderNumberError::InvalidFormat(s.to_string());

        let mut parts = s.split('-');
        let (Some(prefix), Some(year), Some(sequence), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !all_digits(year, 4) || !all_digits(sequence, 6) {
            return Err(invalid());
        }

        let prefix = prefix.parse().map_err(|_| invalid())?;
        let year = year.parse().map_err(|_| invalid())?;
        let sequence = sequence.parse().map_err(|_| invalid())?;
        Self::new(prefix, year, sequence).map_err(|_| invalid())
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_zero_padded() {
        let number = OrderNumber::new(OrderNumberPrefix::Order, 2026, 42).unwrap();
        assert_eq!(number.to_string(), "ORD-2026-000042");
        assert_eq!(
            OrderNumber::year_prefix(OrderNumberPrefix::Appointment, 2026),
            "APT-2026-"
        );
    }

    #[test]
    fn parse_valid_number() {
        let number: OrderNumber = "APT-2025-001234".parse().unwrap();
        assert_eq!(number.prefix(), OrderNumberPrefix::Appointment);
        assert_eq!(number.year(), 2025);
        assert_eq!(number.sequence(), 1234);
    }

    #[test]
    fn parse_rejects_malformed_numbers() {
        for input in [
            "",
            "ORD-2026",
            "ORD-2026-12345",
            "ORD-2026-0000001",
            "ORD-26-000001",
            "XYZ-2026-000001",
            "ORD-2026-000000",
            "ORD-2026-00000a",
            "ORD-2026-000001-1",
        ] {
            assert!(input.parse::<OrderNumber>().is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn next_after_increments_within_year() {
        let previous: OrderNumber = "ORD-2026-000009".parse().unwrap();
        let next = OrderNumber::next_after(OrderNumberPrefix::Order, 2026, Some(&previous)).unwrap();
        assert_eq!(next.to_string(), "ORD-2026-000010");
    }

    #[test]
    fn next_after_restarts_for_new_year_or_nothing() {
        let last_year: OrderNumber = "ORD-2025-000500".parse().unwrap();
        let next =
            OrderNumber::next_after(OrderNumberPrefix::Order, 2026, Some(&last_year)).unwrap();
        assert_eq!(next.to_string(), "ORD-2026-000001");

        let first = OrderNumber::next_after(OrderNumberPrefix::Order, 2026, None).unwrap();
        assert_eq!(first.sequence(), 1);
    }

    #[test]
    fn sequence_overflow_is_an_error() {
        let last: OrderNumber = "ORD-2026-999999".parse().unwrap();
        assert_eq!(
            OrderNumber::next_after(OrderNumberPrefix::Order, 2026, Some(&last)),
            Err(OrderNumberError::SequenceExhausted {
                prefix: OrderNumberPrefix::Order,
                year: 2026
            })
        );
    }

    #[test]
    fn lexicographic_order_matches_issue_order() {
        let a: OrderNumber = "ORD-2026-000099".parse().unwrap();
        let b: OrderNumber = "ORD-2026-000100".parse().unwrap();
        assert!(a.to_string() < b.to_string());
        assert!(a < b);
    }

    #[test]
    fn serializes_as_string() {
        let number: OrderNumber = "ORD-2026-000001".parse().unwrap();
        assert_eq!(
            serde_json::to_value(number).unwrap(),
            serde_json::json!("ORD-2026-000001")
        );
    }
}

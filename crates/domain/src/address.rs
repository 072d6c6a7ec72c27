//! Postal address value object.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address {0} is required")]
    MissingField(&'static str),
}

/// An immutable postal address used for shipping and billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Creates an address. Street, city and country must not be blank.
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let address = Self {
            street: street.into().trim().to_string(),
            city: city.into().trim().to_string(),
            state: state.into().trim().to_string(),
            postal_code: postal_code.into().trim().to_string(),
            country: country.into().trim().to_string(),
        };
        address.validate()?;
        Ok(address)
    }

    /// Checks the required fields of an address built field by field.
    pub fn validate(&self) -> Result<(), AddressError> {
        if self.street.trim().is_empty() {
            return Err(AddressError::MissingField("street"));
        }
        if self.city.trim().is_empty() {
            return Err(AddressError::MissingField("city"));
        }
        if self.country.trim().is_empty() {
            return Err(AddressError::MissingField("country"));
        }
        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.street, self.city)?;
        if !self.state.is_empty() {
            write!(f, ", {}", self.state)?;
        }
        if !self.postal_code.is_empty() {
            write!(f, " {}", self.postal_code)?;
        }
        write!(f, ", {}", self.country)
    }
}

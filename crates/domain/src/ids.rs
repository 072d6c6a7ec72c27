//! Typed identifiers and the SKU value object.

use common::AggregateId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        common::uuid_id!($(#[$meta])* $name);

        impl From<$name> for AggregateId {
            fn from(id: $name) -> Self {
                AggregateId::from_uuid(id.as_uuid())
            }
        }

        impl From<AggregateId> for $name {
            fn from(id: AggregateId) -> Self {
                Self::from_uuid(id.as_uuid())
            }
        }
    };
}

entity_id!(
    /// Identifier of a customer account.
    UserId
);

entity_id!(
    /// Identifier of a catalog product.
    ProductId
);

/// Maximum SKU length.
pub const SKU_MAX_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU cannot be empty")]
    Empty,

    #[error("SKU cannot be longer than {max} characters, got {len}")]
    TooLong { len: usize, max: usize },
}

/// Stock keeping unit: trimmed, uppercased, unique across the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: &str) -> Result<Self, SkuError> {
        let value = value.trim().to_uppercase();
        if value.is_empty() {
            return Err(SkuError::Empty);
        }
        let len = value.chars().count();
        if len > SKU_MAX_LEN {
            return Err(SkuError::TooLong {
                len,
                max: SKU_MAX_LEN,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self {
        sku.0
    }
}

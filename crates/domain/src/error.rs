//! Domain error types.

use document_store::StoreError;
use thiserror::Error;

use crate::{
    address::AddressError,
    cart::CartError,
    ids::SkuError,
    money::MoneyError,
    order::{OrderError, OrderNumberError},
    product::ProductError,
};

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("{0}")]
    Product(#[from] ProductError),

    #[error("{0}")]
    Cart(#[from] CartError),

    #[error("{0}")]
    Money(#[from] MoneyError),

    #[error("{0}")]
    Address(#[from] AddressError),

    #[error("{0}")]
    Sku(#[from] SkuError),

    #[error("{0}")]
    OrderNumber(#[from] OrderNumberError),

    /// Entity not found.
    #[error("{aggregate_type} not found: {id}")]
    NotFound {
        aggregate_type: &'static str,
        id: String,
    },

    /// An entity that is already persisted was staged as new.
    #[error("{aggregate_type} {id} is already persisted")]
    AlreadyPersisted {
        aggregate_type: &'static str,
        id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if the unit of work lost a race and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_retryable())
    }
}

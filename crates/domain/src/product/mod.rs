//! Product entity and its stock operations.

mod aggregate;
mod events;

pub use aggregate::{NewProduct, Product, ProductDetails};
pub use events::{
    PriceChangedData, ProductCreatedData, ProductDetailsUpdatedData, ProductEvent,
    ProductStatusChangedData, StockChangedData,
};

use thiserror::Error;

use crate::{ids::ProductId, money::MoneyError};

/// Errors that can occur during product operations.
#[derive(Debug, Error)]
pub enum ProductError {
    /// Quantity must be at least 1.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The requested quantity exceeds the units on hand.
    #[error("Insufficient stock. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// Restoring stock would overflow the counter.
    #[error("Stock overflow for product {product_id}")]
    StockOverflow { product_id: ProductId },

    /// A required product field is blank.
    #[error("Product {0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Money(#[from] MoneyError),
}

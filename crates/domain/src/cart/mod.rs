//! Shopping cart entity.

mod aggregate;
mod events;

pub use aggregate::{Cart, CartItem, DEFAULT_CART_EXPIRATION_DAYS};
pub use events::{
    CartClearedData, CartCreatedData, CartEvent, CartExpirationExtendedData, CartItemAddedData,
    CartItemQuantityUpdatedData, CartItemRemovedData,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{ids::ProductId, money::MoneyError};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart is past its expiration and cannot be changed.
    #[error("Cart expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    /// Quantity must be at least 1.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Item not found in cart.
    #[error("Item not found in cart: {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// Expiration can only be extended by a positive number of days.
    #[error("Invalid expiration extension: {days} days")]
    InvalidExpiration { days: u32 },

    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    #[error("Product is not available: {product_id}")]
    ProductInactive { product_id: ProductId },

    #[error("Insufficient stock for product {product_id}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    #[error("{0}")]
    Money(#[from] MoneyError),
}

//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

use crate::{
    ids::ProductId,
    money::{Money, MoneyError},
};

use super::OrderError;

/// A line of an order.
///
/// The unit price is captured when the order is placed and does not follow
/// later catalog price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Product name at the time of ordering.
    pub product_name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item. Quantity must be at least 1.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }
        Ok(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
        })
    }

    /// Returns the total price for this item (quantity * unit_price).
    pub fn total_price(&self) -> Result<Money, MoneyError> {
        self.unit_price.multiply(self.quantity)
    }
}

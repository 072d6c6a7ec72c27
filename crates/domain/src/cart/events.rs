//! Cart domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::DomainEvent,
    ids::{ProductId, UserId},
    money::{Currency, Money},
};

/// Events that can occur on a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    CartCreated(CartCreatedData),

    /// Units were added; merges into an existing line for the same product.
    CartItemAdded(CartItemAddedData),

    CartItemQuantityUpdated(CartItemQuantityUpdatedData),

    CartItemRemoved(CartItemRemovedData),

    CartCleared(CartClearedData),

    CartExpirationExtended(CartExpirationExtendedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartCreated(_) => "CartCreated",
            CartEvent::CartItemAdded(_) => "CartItemAdded",
            CartEvent::CartItemQuantityUpdated(_) => "CartItemQuantityUpdated",
            CartEvent::CartItemRemoved(_) => "CartItemRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
            CartEvent::CartExpirationExtended(_) => "CartExpirationExtended",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCreatedData {
    pub cart_id: AggregateId,
    pub user_id: UserId,
    pub currency: Currency,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemAddedData {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemQuantityUpdatedData {
    pub product_id: ProductId,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRemovedData {
    pub product_id: ProductId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub item_count: usize,
    pub cleared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartExpirationExtendedData {
    pub expires_at: DateTime<Utc>,
    pub extended_at: DateTime<Utc>,
}

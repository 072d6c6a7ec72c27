//! Product domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    aggregate::DomainEvent,
    ids::{ProductId, Sku},
    money::Money,
};

use super::ProductDetails;

/// Events that can occur on a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    /// Product was added to the catalog.
    ProductCreated(ProductCreatedData),

    /// Stock was set to an absolute value.
    StockUpdated(StockChangedData),

    /// Units were taken out of stock for an order.
    StockReduced(StockChangedData),

    /// Units were returned to stock after a cancellation.
    StockRestored(StockChangedData),

    PriceChanged(PriceChangedData),

    DetailsUpdated(ProductDetailsUpdatedData),

    ProductActivated(ProductStatusChangedData),

    ProductDeactivated(ProductStatusChangedData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "ProductCreated",
            ProductEvent::StockUpdated(_) => "StockUpdated",
            ProductEvent::StockReduced(_) => "StockReduced",
            ProductEvent::StockRestored(_) => "StockRestored",
            ProductEvent::PriceChanged(_) => "PriceChanged",
            ProductEvent::DetailsUpdated(_) => "DetailsUpdated",
            ProductEvent::ProductActivated(_) => "ProductActivated",
            ProductEvent::ProductDeactivated(_) => "ProductDeactivated",
        }
    }
}

/// Data for ProductCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreatedData {
    pub product_id: ProductId,
    pub sku: Sku,
    pub name_en: String,
    pub name_ar: String,
    pub description_en: String,
    pub description_ar: String,
    pub category_id: Option<Uuid>,
    pub image_urls: Vec<String>,
    pub price: Money,
    pub stock_quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// Data shared by all stock events.
///
/// `quantity` is the amount moved (or the new absolute value for
/// `StockUpdated`); `stock_quantity` is the stock after the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockChangedData {
    pub product_id: ProductId,
    pub sku: Sku,
    pub name: String,
    pub quantity: u32,
    pub previous_stock: u32,
    pub stock_quantity: u32,
    pub changed_at: DateTime<Utc>,
}

/// Data for PriceChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangedData {
    pub old_price: Money,
    pub new_price: Money,
    pub changed_at: DateTime<Utc>,
}

/// Data for DetailsUpdated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetailsUpdatedData {
    pub details: ProductDetails,
    pub updated_at: DateTime<Utc>,
}

/// Data for ProductActivated and ProductDeactivated events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStatusChangedData {
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_event_serializes_with_type_tag() {
        let event = ProductEvent::StockReduced(StockChangedData {
            product_id: ProductId::new(),
            sku: Sku::new("wid-1").unwrap(),
            name: "Widget".to_string(),
            quantity: 2,
            previous_stock: 10,
            stock_quantity: 8,
            changed_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StockReduced");
        assert_eq!(json["data"]["stock_quantity"], 8);
        assert_eq!(json["data"]["sku"], "WID-1");
        assert_eq!(event.event_type(), "StockReduced");
    }
}

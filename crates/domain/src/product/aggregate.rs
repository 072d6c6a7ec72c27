//! Product entity implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use document_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    aggregate::Aggregate,
    ids::{ProductId, Sku},
    money::Money,
};

use super::{
    ProductError, ProductEvent,
    events::{
        PriceChangedData, ProductCreatedData, ProductDetailsUpdatedData, ProductStatusChangedData,
        StockChangedData,
    },
};

/// Descriptive catalog fields of a product.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name_en: String,
    #[serde(default)]
    pub name_ar: String,
    #[serde(default)]
    pub description_en: String,
    #[serde(default)]
    pub description_ar: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl ProductDetails {
    fn validate(&self) -> Result<(), ProductError> {
        if self.name_en.trim().is_empty() {
            return Err(ProductError::MissingField("name"));
        }
        Ok(())
    }
}

/// Input for [`Product::create`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: Sku,
    pub details: ProductDetails,
    pub price: Money,
    pub stock_quantity: u32,
}

/// Product entity: the single source of truth for units available to sell.
///
/// Stock never goes below zero. A failed reduction leaves the product unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: Sku,
    details: ProductDetails,
    price: Money,
    stock_quantity: u32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    #[serde(skip)]
    version: Version,

    #[serde(skip)]
    pending: Vec<ProductEvent>,
}

impl Aggregate for Product {
    type Event = ProductEvent;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> AggregateId {
        self.id.into()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(data) => {
                let version = self.version;
                let pending = std::mem::take(&mut self.pending);
                *self = Self::from_created(data);
                self.version = version;
                self.pending = pending;
            }
            ProductEvent::StockUpdated(data)
            | ProductEvent::StockReduced(data)
            | ProductEvent::StockRestored(data) => {
                self.stock_quantity = data.stock_quantity;
                self.updated_at = data.changed_at;
            }
            ProductEvent::PriceChanged(data) => {
                self.price = data.new_price;
                self.updated_at = data.changed_at;
            }
            ProductEvent::DetailsUpdated(data) => {
                self.details = data.details.clone();
                self.updated_at = data.updated_at;
            }
            ProductEvent::ProductActivated(data) => {
                self.is_active = true;
                self.updated_at = data.changed_at;
            }
            ProductEvent::ProductDeactivated(data) => {
                self.is_active = false;
                self.updated_at = data.changed_at;
            }
        }
    }

    fn take_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.pending)
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.sku.to_string())
    }
}

// Query methods
impl Product {
    pub fn product_id(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Returns the English display name.
    pub fn name(&self) -> &str {
        &self.details.name_en
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_quantity(&self) -> u32 {
        self.stock_quantity
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if at least `quantity` units are on hand.
    pub fn has_sufficient_stock(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Returns true if stock is at or below `threshold`.
    pub fn is_low_stock(&self, threshold: u32) -> bool {
        self.stock_quantity <= threshold
    }
}

// Command methods
impl Product {
    /// Creates a new active product with its initial stock.
    pub fn create(new: NewProduct) -> Result<Self, ProductError> {
        new.details.validate()?;

        let data = ProductCreatedData {
            product_id: ProductId::new(),
            sku: new.sku,
            name_en: new.details.name_en.trim().to_string(),
            name_ar: new.details.name_ar,
            description_en: new.details.description_en,
            description_ar: new.details.description_ar,
            category_id: new.details.category_id,
            image_urls: new.details.image_urls,
            price: new.price,
            stock_quantity: new.stock_quantity,
            created_at: Utc::now(),
        };

        let mut product = Self::from_created(&data);
        product.record(ProductEvent::ProductCreated(data));
        Ok(product)
    }

    /// Sets stock to an absolute value.
    pub fn update_stock(&mut self, quantity: u32) {
        let event = ProductEvent::StockUpdated(self.stock_change(quantity, quantity));
        self.record(event);
    }

    /// Takes `quantity` units out of stock.
    ///
    /// Fails without changing anything if fewer units are available.
    pub fn reduce_stock(&mut self, quantity: u32) -> Result<(), ProductError> {
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity });
        }
        if !self.has_sufficient_stock(quantity) {
            return Err(ProductError::InsufficientStock {
                product_id: self.id,
                available: self.stock_quantity,
                requested: quantity,
            });
        }

        let remaining = self.stock_quantity - quantity;
        let event = ProductEvent::StockReduced(self.stock_change(quantity, remaining));
        self.record(event);
        Ok(())
    }

    /// Returns `quantity` units to stock.
    pub fn restore_stock(&mut self, quantity: u32) -> Result<(), ProductError> {
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity });
        }
        let restored = self
            .stock_quantity
            .checked_add(quantity)
            .ok_or(ProductError::StockOverflow {
                product_id: self.id,
            })?;

        let event = ProductEvent::StockRestored(self.stock_change(quantity, restored));
        self.record(event);
        Ok(())
    }

    /// Changes the catalog price. Existing orders keep the price they captured.
    pub fn change_price(&mut self, price: Money) {
        if price == self.price {
            return;
        }
        self.record(ProductEvent::PriceChanged(PriceChangedData {
            old_price: self.price,
            new_price: price,
            changed_at: Utc::now(),
        }));
    }

    pub fn update_details(&mut self, details: ProductDetails) -> Result<(), ProductError> {
        details.validate()?;
        if details == self.details {
            return Ok(());
        }
        self.record(ProductEvent::DetailsUpdated(ProductDetailsUpdatedData {
            details,
            updated_at: Utc::now(),
        }));
        Ok(())
    }

    pub fn activate(&mut self) {
        if !self.is_active {
            self.record(ProductEvent::ProductActivated(ProductStatusChangedData {
                changed_at: Utc::now(),
            }));
        }
    }

    pub fn deactivate(&mut self) {
        if self.is_active {
            self.record(ProductEvent::ProductDeactivated(ProductStatusChangedData {
                changed_at: Utc::now(),
            }));
        }
    }
}

// Helpers
impl Product {
    fn from_created(data: &ProductCreatedData) -> Self {
        Self {
            id: data.product_id,
            sku: data.sku.clone(),
            details: ProductDetails {
                name_en: data.name_en.clone(),
                name_ar: data.name_ar.clone(),
                description_en: data.description_en.clone(),
                description_ar: data.description_ar.clone(),
                category_id: data.category_id,
                image_urls: data.image_urls.clone(),
            },
            price: data.price,
            stock_quantity: data.stock_quantity,
            is_active: true,
            created_at: data.created_at,
            updated_at: data.created_at,
            version: Version::initial(),
            pending: Vec::new(),
        }
    }

    fn stock_change(&self, quantity: u32, stock_quantity: u32) -> StockChangedData {
        StockChangedData {
            product_id: self.id,
            sku: self.sku.clone(),
            name: self.details.name_en.clone(),
            quantity,
            previous_stock: self.stock_quantity,
            stock_quantity,
            changed_at: Utc::now(),
        }
    }

    fn record(&mut self, event: ProductEvent) {
        self.apply(&event);
        self.pending.push(event);
    }
}

//! Cart entity implementation.

use chrono::{DateTime, Duration, Utc};
use common::AggregateId;
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Aggregate,
    ids::{ProductId, UserId},
    money::{Currency, Money, MoneyError},
    product::Product,
};

use super::{
    CartError, CartEvent,
    events::{
        CartClearedData, CartCreatedData, CartExpirationExtendedData, CartItemAddedData,
        CartItemQuantityUpdatedData, CartItemRemovedData,
    },
};

/// Days a new cart stays alive when no expiration is given.
pub const DEFAULT_CART_EXPIRATION_DAYS: u32 = 30;

/// A line in a cart. The unit price is captured when the line is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    /// Returns `unit_price * quantity`.
    pub fn total_price(&self) -> Result<Money, MoneyError> {
        self.unit_price.multiply(self.quantity)
    }
}

/// A user's shopping cart.
///
/// Holds at most one line per product and never reserves stock. Once past
/// `expires_at` every mutation is rejected until the expiration is extended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    id: AggregateId,
    user_id: UserId,
    currency: Currency,
    items: Vec<CartItem>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    #[serde(skip)]
    version: Version,

    #[serde(skip)]
    pending: Vec<CartEvent>,
}

impl Aggregate for Cart {
    type Event = CartEvent;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartCreated(data) => {
                self.id = data.cart_id;
                self.user_id = data.user_id;
                self.currency = data.currency;
                self.items.clear();
                self.expires_at = data.expires_at;
                self.created_at = data.created_at;
                self.updated_at = data.created_at;
            }
            CartEvent::CartItemAdded(data) => {
                match self.items.iter_mut().find(|i| i.product_id == data.product_id) {
                    Some(item) => item.quantity += data.quantity,
                    None => self.items.push(CartItem {
                        product_id: data.product_id,
                        quantity: data.quantity,
                        unit_price: data.unit_price,
                    }),
                }
                self.updated_at = data.added_at;
            }
            CartEvent::CartItemQuantityUpdated(data) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.product_id == data.product_id)
                {
                    item.quantity = data.new_quantity;
                }
                self.updated_at = data.updated_at;
            }
            CartEvent::CartItemRemoved(data) => {
                self.items.retain(|i| i.product_id != data.product_id);
                self.updated_at = data.removed_at;
            }
            CartEvent::CartCleared(data) => {
                self.items.clear();
                self.updated_at = data.cleared_at;
            }
            CartEvent::CartExpirationExtended(data) => {
                self.expires_at = data.expires_at;
                self.updated_at = data.extended_at;
            }
        }
    }

    fn take_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.pending)
    }

    /// One cart per user.
    fn unique_key(&self) -> Option<String> {
        Some(self.user_id.to_string())
    }
}

// Query methods
impl Cart {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line totals; zero for an empty cart.
    pub fn total(&self) -> Result<Money, MoneyError> {
        let lines = self
            .items
            .iter()
            .map(CartItem::total_price)
            .collect::<Result<Vec<_>, _>>()?;
        Money::sum(self.currency, &lines)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks every line against current catalog state.
    ///
    /// Advisory only: nothing is reserved, so the order can still fail later.
    pub fn validate_stock(&self, products: &[Product]) -> Result<(), CartError> {
        for item in &self.items {
            let product = products
                .iter()
                .find(|p| p.product_id() == item.product_id)
                .ok_or(CartError::ProductNotFound {
                    product_id: item.product_id,
                })?;

            if !product.is_active() {
                return Err(CartError::ProductInactive {
                    product_id: item.product_id,
                });
            }
            if !product.has_sufficient_stock(item.quantity) {
                return Err(CartError::InsufficientStock {
                    product_id: item.product_id,
                    available: product.stock_quantity(),
                    requested: item.quantity,
                });
            }
        }
        Ok(())
    }
}

// Command methods
impl Cart {
    /// Creates an empty cart that expires at `expires_at`.
    pub fn create(user_id: UserId, currency: Currency, expires_at: DateTime<Utc>) -> Self {
        let data = CartCreatedData {
            cart_id: AggregateId::new(),
            user_id,
            currency,
            expires_at,
            created_at: Utc::now(),
        };

        let mut cart = Self {
            id: data.cart_id,
            user_id,
            currency,
            items: Vec::new(),
            expires_at,
            created_at: data.created_at,
            updated_at: data.created_at,
            version: Version::initial(),
            pending: Vec::new(),
        };
        cart.record(CartEvent::CartCreated(data));
        cart
    }

    /// Creates an empty cart that expires after `days`.
    pub fn create_expiring_in(user_id: UserId, currency: Currency, days: u32) -> Self {
        Self::create(user_id, currency, Utc::now() + Duration::days(i64::from(days)))
    }

    /// Adds units of a product, merging with an existing line.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }
        self.ensure_not_expired()?;
        if unit_price.currency() != self.currency {
            return Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                actual: unit_price.currency(),
            }
            .into());
        }
        if let Some(item) = self.item(product_id) {
            item.quantity
                .checked_add(quantity)
                .ok_or(CartError::InvalidQuantity { quantity })?;
        }

        self.record(CartEvent::CartItemAdded(CartItemAddedData {
            product_id,
            quantity,
            unit_price,
            added_at: Utc::now(),
        }));
        Ok(())
    }

    /// Sets the absolute quantity of a line. Zero removes the line.
    pub fn update_item_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        self.ensure_not_expired()?;
        let existing = self
            .item(product_id)
            .ok_or(CartError::ItemNotFound { product_id })?
            .quantity;

        if quantity == 0 {
            self.record(CartEvent::CartItemRemoved(CartItemRemovedData {
                product_id,
                removed_at: Utc::now(),
            }));
        } else if quantity != existing {
            self.record(CartEvent::CartItemQuantityUpdated(
                CartItemQuantityUpdatedData {
                    product_id,
                    old_quantity: existing,
                    new_quantity: quantity,
                    updated_at: Utc::now(),
                },
            ));
        }
        Ok(())
    }

    /// Removes a line. Removing an absent product is a no-op.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), CartError> {
        if self.item(product_id).is_none() {
            return Ok(());
        }
        self.ensure_not_expired()?;
        self.record(CartEvent::CartItemRemoved(CartItemRemovedData {
            product_id,
            removed_at: Utc::now(),
        }));
        Ok(())
    }

    /// Removes every line. Clearing an empty cart records nothing.
    pub fn clear(&mut self) -> Result<(), CartError> {
        if self.items.is_empty() {
            return Ok(());
        }
        self.ensure_not_expired()?;
        self.record(CartEvent::CartCleared(CartClearedData {
            item_count: self.items.len(),
            cleared_at: Utc::now(),
        }));
        Ok(())
    }

    /// Moves the expiration to `days` from now, even if the cart already expired.
    pub fn extend_expiration(&mut self, days: u32) -> Result<(), CartError> {
        if days == 0 {
            return Err(CartError::InvalidExpiration { days });
        }
        let now = Utc::now();
        self.record(CartEvent::CartExpirationExtended(
            CartExpirationExtendedData {
                expires_at: now + Duration::days(i64::from(days)),
                extended_at: now,
            },
        ));
        Ok(())
    }
}

// Helpers
impl Cart {
    fn ensure_not_expired(&self) -> Result<(), CartError> {
        if self.is_expired() {
            return Err(CartError::Expired {
                expired_at: self.expires_at,
            });
        }
        Ok(())
    }

    fn record(&mut self, event: CartEvent) {
        self.apply(&event);
        self.pending.push(event);
    }
}

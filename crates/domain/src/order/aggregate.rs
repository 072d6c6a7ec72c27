//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    aggregate::Aggregate,
    ids::{ProductId, UserId},
    money::{Currency, Money, MoneyError},
};

use super::{
    OrderError, OrderEvent, OrderItem, OrderNumber, OrderStatus, PaymentStatus,
    events::{
        ItemAddedData, ItemQuantityUpdatedData, ItemRemovedData, OrderCancelledData,
        OrderConfirmedData, OrderCreatedData, OrderDeliveredData, OrderRefundedData,
        OrderShippedData, PaymentCompletedData, PaymentFailedData, ProcessingStartedData,
    },
};

/// Order aggregate root.
///
/// Owns its items and keeps `total_amount` equal to the sum of the line
/// totals. Items can only change while the order is `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: AggregateId,
    order_number: OrderNumber,
    user_id: UserId,
    currency: Currency,
    items: Vec<OrderItem>,
    total_amount: Money,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_id: Option<String>,
    shipping_address: Address,
    billing_address: Address,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    version: Version,

    #[serde(skip)]
    pending: Vec<OrderEvent>,
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderCreated(data) => {
                let version = self.version;
                let pending = std::mem::take(&mut self.pending);
                *self = Self::from_created(data);
                self.version = version;
                self.pending = pending;
            }
            OrderEvent::ItemAdded(data) => {
                match self
                    .items
                    .iter_mut()
                    .find(|i| i.product_id == data.item.product_id)
                {
                    Some(item) => *item = data.item.clone(),
                    None => self.items.push(data.item.clone()),
                }
                self.total_amount = data.total_amount;
                self.updated_at = data.added_at;
            }
            OrderEvent::ItemRemoved(data) => {
                self.items.retain(|i| i.product_id != data.product_id);
                self.total_amount = data.total_amount;
                self.updated_at = data.removed_at;
            }
            OrderEvent::ItemQuantityUpdated(data) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.product_id == data.product_id)
                {
                    item.quantity = data.new_quantity;
                }
                self.total_amount = data.total_amount;
                self.updated_at = data.updated_at;
            }
            OrderEvent::OrderConfirmed(data) => {
                self.status = OrderStatus::Confirmed;
                self.confirmed_at = Some(data.confirmed_at);
                self.updated_at = data.confirmed_at;
            }
            OrderEvent::ProcessingStarted(data) => {
                self.status = OrderStatus::Processing;
                self.updated_at = data.started_at;
            }
            OrderEvent::OrderShipped(data) => {
                self.status = OrderStatus::Shipped;
                self.shipped_at = Some(data.shipped_at);
                self.updated_at = data.shipped_at;
            }
            OrderEvent::OrderDelivered(data) => {
                self.status = OrderStatus::Delivered;
                self.delivered_at = Some(data.delivered_at);
                self.updated_at = data.delivered_at;
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.cancellation_reason = Some(data.reason.clone());
                self.cancelled_at = Some(data.cancelled_at);
                self.updated_at = data.cancelled_at;
            }
            OrderEvent::OrderRefunded(data) => {
                self.status = OrderStatus::Refunded;
                self.payment_status = PaymentStatus::Refunded;
                self.refunded_at = Some(data.refunded_at);
                self.updated_at = data.refunded_at;
            }
            OrderEvent::PaymentCompleted(data) => {
                self.payment_status = PaymentStatus::Completed;
                self.payment_id = Some(data.payment_id.clone());
                self.updated_at = data.completed_at;
            }
            OrderEvent::PaymentFailed(data) => {
                self.payment_status = PaymentStatus::Failed;
                self.updated_at = data.failed_at;
            }
        }
    }

    fn take_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.pending)
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.order_number.to_string())
    }
}

// Query methods
impl Order {
    pub fn order_number(&self) -> OrderNumber {
        self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns all items in the order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns an item by product ID.
    pub fn item(&self, product_id: ProductId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Returns the number of lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    pub fn is_modifiable(&self) -> bool {
        self.status.is_modifiable()
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_be_cancelled()
    }

    /// Returns true if the payment has been captured.
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }
}

// Command methods
impl Order {
    /// Places a new, empty order in `Pending` status.
    pub fn create(
        order_number: OrderNumber,
        user_id: UserId,
        currency: Currency,
        shipping_address: Address,
        billing_address: Address,
    ) -> Self {
        let data = OrderCreatedData {
            order_id: AggregateId::new(),
            order_number,
            user_id,
            currency,
            shipping_address,
            billing_address,
            created_at: Utc::now(),
        };

        let mut order = Self::from_created(&data);
        order.record(OrderEvent::OrderCreated(data));
        order
    }

    /// Adds an item to the order.
    ///
    /// If the product is already in the order, its quantity is increased and
    /// the line keeps its original unit price.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), OrderError> {
        self.ensure_modifiable("add item")?;
        let new_item = OrderItem::new(product_id, product_name, quantity, unit_price)?;
        if unit_price.currency() != self.currency {
            return Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                actual: unit_price.currency(),
            }
            .into());
        }

        let mut items = self.items.clone();
        let item = match items.iter_mut().find(|i| i.product_id == product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or(OrderError::InvalidQuantity { quantity })?;
                existing.clone()
            }
            None => {
                items.push(new_item.clone());
                new_item
            }
        };
        let total_amount = self.compute_total(&items)?;

        self.record(OrderEvent::ItemAdded(ItemAddedData {
            item,
            quantity_added: quantity,
            total_amount,
            added_at: Utc::now(),
        }));
        Ok(())
    }

    /// Removes an item from the order.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), OrderError> {
        self.ensure_modifiable("remove item")?;
        if self.item(product_id).is_none() {
            return Err(OrderError::ItemNotFound { product_id });
        }

        let items: Vec<_> = self
            .items
            .iter()
            .filter(|i| i.product_id != product_id)
            .cloned()
            .collect();
        let total_amount = self.compute_total(&items)?;

        self.record(OrderEvent::ItemRemoved(ItemRemovedData {
            product_id,
            total_amount,
            removed_at: Utc::now(),
        }));
        Ok(())
    }

    /// Sets the quantity of an existing item. Use `remove_item` to drop a line.
    pub fn update_item_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), OrderError> {
        self.ensure_modifiable("update item quantity")?;
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }
        let old_quantity = self
            .item(product_id)
            .ok_or(OrderError::ItemNotFound { product_id })?
            .quantity;
        if old_quantity == quantity {
            return Ok(());
        }

        let mut items = self.items.clone();
        for item in items.iter_mut().filter(|i| i.product_id == product_id) {
            item.quantity = quantity;
        }
        let total_amount = self.compute_total(&items)?;

        self.record(OrderEvent::ItemQuantityUpdated(ItemQuantityUpdatedData {
            product_id,
            old_quantity,
            new_quantity: quantity,
            total_amount,
            updated_at: Utc::now(),
        }));
        Ok(())
    }

    /// Confirms a pending order. The order must have items.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.ensure_status(self.status.can_confirm(), "confirm")?;
        if !self.has_items() {
            return Err(OrderError::NoItems);
        }

        self.record(OrderEvent::OrderConfirmed(OrderConfirmedData {
            total_amount: self.total_amount,
            item_count: self.items.len(),
            confirmed_at: Utc::now(),
        }));
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), OrderError> {
        self.ensure_status(self.status.can_start_processing(), "start processing")?;
        self.record(OrderEvent::ProcessingStarted(ProcessingStartedData {
            started_at: Utc::now(),
        }));
        Ok(())
    }

    /// Marks the order as shipped and records `shipped_at`.
    pub fn ship(&mut self) -> Result<(), OrderError> {
        self.ensure_status(self.status.can_ship(), "ship")?;
        self.record(OrderEvent::OrderShipped(OrderShippedData {
            shipped_at: Utc::now(),
        }));
        Ok(())
    }

    /// Marks the order as delivered and records `delivered_at`.
    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.ensure_status(self.status.can_deliver(), "deliver")?;
        self.record(OrderEvent::OrderDelivered(OrderDeliveredData {
            delivered_at: Utc::now(),
        }));
        Ok(())
    }

    /// Cancels the order. Stock restoration is the caller's job.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.ensure_status(self.status.can_be_cancelled(), "cancel")?;
        self.record(OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            previous_status: self.status,
            cancelled_at: Utc::now(),
        }));
        Ok(())
    }

    /// Records a captured payment.
    pub fn mark_payment_completed(&mut self, payment_id: impl Into<String>) -> Result<(), OrderError> {
        let payment_id = payment_id.into();
        if payment_id.trim().is_empty() {
            return Err(OrderError::EmptyPaymentId);
        }
        if !self.payment_status.can_complete() {
            return Err(OrderError::InvalidPaymentTransition {
                current: self.payment_status,
                action: "complete payment",
            });
        }

        self.record(OrderEvent::PaymentCompleted(PaymentCompletedData {
            payment_id,
            amount: self.total_amount,
            completed_at: Utc::now(),
        }));
        Ok(())
    }

    /// Records a declined or failed payment attempt.
    pub fn mark_payment_failed(&mut self, reason: Option<String>) -> Result<(), OrderError> {
        if !self.payment_status.can_fail() {
            return Err(OrderError::InvalidPaymentTransition {
                current: self.payment_status,
                action: "fail payment",
            });
        }

        self.record(OrderEvent::PaymentFailed(PaymentFailedData {
            reason,
            failed_at: Utc::now(),
        }));
        Ok(())
    }

    /// Closes the order as refunded. Requires a completed payment.
    pub fn process_refund(&mut self) -> Result<(), OrderError> {
        if !self.payment_status.can_refund() {
            return Err(OrderError::PaymentNotCompleted {
                current: self.payment_status,
            });
        }

        self.record(OrderEvent::OrderRefunded(OrderRefundedData {
            payment_id: self.payment_id.clone(),
            previous_status: self.status,
            refunded_at: Utc::now(),
        }));
        Ok(())
    }
}

// Helpers
impl Order {
    fn from_created(data: &OrderCreatedData) -> Self {
        Self {
            id: data.order_id,
            order_number: data.order_number,
            user_id: data.user_id,
            currency: data.currency,
            items: Vec::new(),
            total_amount: Money::zero(data.currency),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            shipping_address: data.shipping_address.clone(),
            billing_address: data.billing_address.clone(),
            cancellation_reason: None,
            created_at: data.created_at,
            updated_at: data.created_at,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            refunded_at: None,
            version: Version::initial(),
            pending: Vec::new(),
        }
    }

    /// Recomputes the total from scratch using each line's own unit price.
    fn compute_total(&self, items: &[OrderItem]) -> Result<Money, MoneyError> {
        let lines = items
            .iter()
            .map(OrderItem::total_price)
            .collect::<Result<Vec<_>, _>>()?;
        Money::sum(self.currency, &lines)
    }

    fn ensure_modifiable(&self, action: &'static str) -> Result<(), OrderError> {
        self.ensure_status(self.status.is_modifiable(), action)
    }

    fn ensure_status(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if !allowed {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action,
            });
        }
        Ok(())
    }

    fn record(&mut self, event: OrderEvent) {
        self.apply(&event);
        self.pending.push(event);
    }
}

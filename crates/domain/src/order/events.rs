//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    aggregate::DomainEvent,
    ids::{ProductId, UserId},
    money::{Currency, Money},
};

use super::{OrderItem, OrderNumber, OrderStatus};

/// Events that can occur on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed.
    OrderCreated(OrderCreatedData),

    /// Item was added to the order, or merged into an existing line.
    ItemAdded(ItemAddedData),

    /// Item was removed from the order.
    ItemRemoved(ItemRemovedData),

    /// Item quantity was updated.
    ItemQuantityUpdated(ItemQuantityUpdatedData),

    OrderConfirmed(OrderConfirmedData),

    ProcessingStarted(ProcessingStartedData),

    OrderShipped(OrderShippedData),

    OrderDelivered(OrderDeliveredData),

    /// Order was cancelled.
    OrderCancelled(OrderCancelledData),

    /// Payment was refunded; the order is closed.
    OrderRefunded(OrderRefundedData),

    PaymentCompleted(PaymentCompletedData),

    PaymentFailed(PaymentFailedData),
}

impl OrderEvent {
    /// Returns the order status this event leads to, if it changes the status.
    pub fn resulting_status(&self) -> Option<OrderStatus> {
        match self {
            OrderEvent::OrderCreated(_) => Some(OrderStatus::Pending),
            OrderEvent::OrderConfirmed(_) => Some(OrderStatus::Confirmed),
            OrderEvent::ProcessingStarted(_) => Some(OrderStatus::Processing),
            OrderEvent::OrderShipped(_) => Some(OrderStatus::Shipped),
            OrderEvent::OrderDelivered(_) => Some(OrderStatus::Delivered),
            OrderEvent::OrderCancelled(_) => Some(OrderStatus::Cancelled),
            OrderEvent::OrderRefunded(_) => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::ItemAdded(_) => "ItemAdded",
            OrderEvent::ItemRemoved(_) => "ItemRemoved",
            OrderEvent::ItemQuantityUpdated(_) => "ItemQuantityUpdated",
            OrderEvent::OrderConfirmed(_) => "OrderConfirmed",
            OrderEvent::ProcessingStarted(_) => "ProcessingStarted",
            OrderEvent::OrderShipped(_) => "OrderShipped",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderRefunded(_) => "OrderRefunded",
            OrderEvent::PaymentCompleted(_) => "PaymentCompleted",
            OrderEvent::PaymentFailed(_) => "PaymentFailed",
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedData {
    /// The unique order ID.
    pub order_id: AggregateId,

    pub order_number: OrderNumber,

    /// The customer who placed the order.
    pub user_id: UserId,

    pub currency: Currency,

    pub shipping_address: Address,

    pub billing_address: Address,

    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// Data for ItemAdded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAddedData {
    /// The resulting line, including quantities merged from an existing line.
    pub item: OrderItem,

    /// Units added by this event.
    pub quantity_added: u32,

    /// Order total after the change.
    pub total_amount: Money,

    pub added_at: DateTime<Utc>,
}

/// Data for ItemRemoved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRemovedData {
    /// The product that was removed.
    pub product_id: ProductId,

    pub total_amount: Money,

    pub removed_at: DateTime<Utc>,
}

/// Data for ItemQuantityUpdated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemQuantityUpdatedData {
    /// The product whose quantity was updated.
    pub product_id: ProductId,

    /// Previous quantity.
    pub old_quantity: u32,

    /// New quantity.
    pub new_quantity: u32,

    pub total_amount: Money,

    pub updated_at: DateTime<Utc>,
}

/// Data for OrderConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmedData {
    /// Total amount at confirmation time.
    pub total_amount: Money,

    /// Number of lines in the order.
    pub item_count: usize,

    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStartedData {
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub shipped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDeliveredData {
    pub delivered_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    /// Reason for cancellation.
    pub reason: String,

    /// Status the order was in when cancelled.
    pub previous_status: OrderStatus,

    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRefundedData {
    /// Payment that was refunded.
    pub payment_id: Option<String>,

    pub previous_status: OrderStatus,

    pub refunded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompletedData {
    pub payment_id: String,

    pub amount: Money,

    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    /// Message reported by the payment collaborator.
    pub reason: Option<String>,

    pub failed_at: DateTime<Utc>,
}

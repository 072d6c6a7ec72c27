//! Order aggregate and related types.

mod aggregate;
mod events;
mod number;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use events::{
    ItemAddedData, ItemQuantityUpdatedData, ItemRemovedData, OrderCancelledData,
    OrderConfirmedData, OrderCreatedData, OrderDeliveredData, OrderEvent, OrderRefundedData,
    OrderShippedData, PaymentCompletedData, PaymentFailedData, ProcessingStartedData,
};
pub use number::{MAX_SEQUENCE, OrderNumber, OrderNumberError, OrderNumberPrefix};
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::OrderItem;

use thiserror::Error;

use crate::{ids::ProductId, money::MoneyError};

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in the expected status.
    #[error("Invalid state transition: cannot {action} from {current_state} status")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Payment is not in the expected status.
    #[error("Invalid payment transition: cannot {action} when payment is {current}")]
    InvalidPaymentTransition {
        current: PaymentStatus,
        action: &'static str,
    },

    /// Refund requires a completed payment.
    #[error("Payment is not completed (current payment status: {current})")]
    PaymentNotCompleted { current: PaymentStatus },

    /// Item not found in order.
    #[error("Item not found: {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A completed payment must carry the gateway's payment id.
    #[error("Payment id is required")]
    EmptyPaymentId,

    #[error("{0}")]
    Money(#[from] MoneyError),
}

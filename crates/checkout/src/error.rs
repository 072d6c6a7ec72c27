//! Application service error types.

use common::AggregateId;
use domain::{
    CartError, DomainError, MoneyError, OrderError, OrderStatus, PaymentStatus, ProductError,
    ProductId, UserId,
};
use thiserror::Error;

/// Errors that can occur in application services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    #[error("Cart not found for user {0}")]
    CartNotFound(UserId),

    /// The acting user does not own the order.
    #[error("User {user_id} is not allowed to modify order {order_id}")]
    Unauthorized {
        user_id: UserId,
        order_id: AggregateId,
    },

    /// The order's payment has already been captured.
    #[error("Order is already paid (payment {payment_id})")]
    AlreadyPaid { payment_id: String },

    /// Only completed payments can be refunded.
    #[error("Order cannot be refunded: payment status is {status}")]
    RefundIneligible { status: PaymentStatus },

    /// No transition leads to the requested status.
    #[error("Unsupported status transition: cannot move an order to {target}")]
    UnsupportedTransition { target: OrderStatus },

    /// Another record already holds a unique business key.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Concurrent writers kept winning until the retry budget ran out.
    #[error("{operation} kept conflicting with concurrent updates after {attempts} attempts: {message}")]
    Conflict {
        operation: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ServiceError {
    /// Returns true if a fresh read-modify-write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Domain(e) if e.is_retryable())
    }
}

macro_rules! via_domain_error {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for ServiceError {
                fn from(e: $error) -> Self {
                    ServiceError::Domain(DomainError::from(e))
                }
            }
        )+
    };
}

via_domain_error!(
    OrderError,
    ProductError,
    CartError,
    MoneyError,
    document_store::StoreError,
    domain::AddressError,
    domain::SkuError,
);

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::StoreError;

    #[test]
    fn store_conflicts_are_retryable() {
        let err: ServiceError = StoreError::UniqueViolation {
            kind: "Order".to_string(),
            key: "ORD-2026-000001".to_string(),
        }
        .into();
        assert!(err.is_retryable());

        let err: ServiceError = OrderError::NoItems.into();
        assert!(!err.is_retryable());
        assert!(!ServiceError::Validation("bad".to_string()).is_retryable());
    }

    #[test]
    fn insufficient_stock_message_passes_through() {
        let err: ServiceError = ProductError::InsufficientStock {
            product_id: ProductId::new(),
            available: 8,
            requested: 9,
        }
        .into();
        assert_eq!(err.to_string(), "Insufficient stock. Available: 8, Requested: 9");
    }
}

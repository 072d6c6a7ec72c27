//! Order and payment state machines.

use serde::{Deserialize, Serialize};

/// The fulfillment status of an order.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
///    │            │              │
///    └────────────┴──────────────┴──► Cancelled
///
/// any status with a completed payment ──► Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order was placed; items can still change.
    #[default]
    Pending,

    Confirmed,

    Processing,

    Shipped,

    /// Order reached the customer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,

    /// Payment was refunded (terminal state).
    Refunded,
}

impl OrderStatus {
    /// Returns true if items can be modified in this status.
    pub fn is_modifiable(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_start_processing(&self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Processing)
    }

    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_be_cancelled(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// The payment status of an order.
///
/// ```text
/// Pending ──► Completed ──► Refunded
///    │            ▲
///    └──► Failed ─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// A failed payment may be retried.
    pub fn can_complete(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Failed)
    }

    pub fn can_fail(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Failed)
    }

    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_only_pending_is_modifiable() {
        for status in ALL {
            assert_eq!(status.is_modifiable(), status == OrderStatus::Pending);
            assert_eq!(status.can_confirm(), status == OrderStatus::Pending);
        }
    }

    #[test]
    fn test_forward_transitions_have_one_source() {
        for status in ALL {
            assert_eq!(status.can_start_processing(), status == OrderStatus::Confirmed);
            assert_eq!(status.can_ship(), status == OrderStatus::Processing);
            assert_eq!(status.can_deliver(), status == OrderStatus::Shipped);
        }
    }

    #[test]
    fn test_can_be_cancelled_before_shipping() {
        assert!(OrderStatus::Pending.can_be_cancelled());
        assert!(OrderStatus::Confirmed.can_be_cancelled());
        assert!(OrderStatus::Processing.can_be_cancelled());
        assert!(!OrderStatus::Shipped.can_be_cancelled());
        assert!(!OrderStatus::Delivered.can_be_cancelled());
        assert!(!OrderStatus::Cancelled.can_be_cancelled());
        assert!(!OrderStatus::Refunded.can_be_cancelled());
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
                OrderStatus::Refunded
            ]
        );
    }

    #[test]
    fn test_parse_and_display() {
        for status in ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!("SHIPPED".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_transitions() {
        assert!(PaymentStatus::Pending.can_complete());
        assert!(PaymentStatus::Failed.can_complete());
        assert!(!PaymentStatus::Completed.can_complete());
        assert!(!PaymentStatus::Refunded.can_complete());

        assert!(PaymentStatus::Completed.can_refund());
        assert!(!PaymentStatus::Pending.can_refund());
        assert!(!PaymentStatus::Refunded.can_refund());

        assert!(!PaymentStatus::Completed.can_fail());
    }
}

//! Order activity read model: a status timeline per order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use document_store::EventEnvelope;
use domain::{
    Aggregate, Money, Order, OrderEvent, OrderNumber, OrderStatus, PaymentStatus, ProductId,
    UserId,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::subscriber::{Subscriber, SubscriberPosition};

/// One step in an order's history.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub sequence: i64,
    pub event_type: String,
    /// Order status after the notification.
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub at: DateTime<Utc>,
}

/// Summary of an order built from its notifications.
#[derive(Debug, Clone, Serialize)]
pub struct OrderActivity {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    /// Units per product.
    pub items: HashMap<ProductId, u32>,
    pub total_amount: Option<Money>,
    pub cancellation_reason: Option<String>,
    pub timeline: Vec<ActivityEntry>,
}

impl OrderActivity {
    pub fn total_quantity(&self) -> u32 {
        self.items.values().sum()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timeline.first().map(|entry| entry.at)
    }
}

struct ActivityState {
    orders: HashMap<AggregateId, OrderActivity>,
    position: SubscriberPosition,
}

impl ActivityState {
    fn new() -> Self {
        Self {
            orders: HashMap::new(),
            position: SubscriberPosition::zero(),
        }
    }
}

/// Read model of order progress.
///
/// Orders first seen after their `OrderCreated` notification (for example
/// when subscribing mid-stream without catch-up) are ignored.
#[derive(Clone)]
pub struct OrderActivityView {
    state: Arc<RwLock<ActivityState>>,
}

impl OrderActivityView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ActivityState::new())),
        }
    }

    /// Gets the activity of one order.
    pub async fn get(&self, order_id: AggregateId) -> Option<OrderActivity> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    /// Gets all orders of a user, newest first.
    pub async fn for_user(&self, user_id: UserId) -> Vec<OrderActivity> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|activity| activity.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_number.cmp(&a.order_number));
        orders
    }

    /// Counts orders currently in the given status.
    pub async fn count_by_status(&self, status: OrderStatus) -> usize {
        self.state
            .read()
            .await
            .orders
            .values()
            .filter(|activity| activity.status == status)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for OrderActivityView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscriber for OrderActivityView {
    fn name(&self) -> &'static str {
        "OrderActivityView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Order::aggregate_type() {
            let mut state = self.state.write().await;
            state.position = state.position.advance(event.sequence);
            return Ok(());
        }

        let order_event: OrderEvent = event.decode()?;
        let order_id = event.aggregate_id;
        let mut state = self.state.write().await;

        if let OrderEvent::OrderCreated(data) = &order_event {
            state.orders.insert(
                order_id,
                OrderActivity {
                    order_id,
                    order_number: data.order_number,
                    user_id: data.user_id,
                    status: OrderStatus::Pending,
                    payment_status: PaymentStatus::Pending,
                    payment_id: None,
                    items: HashMap::new(),
                    total_amount: None,
                    cancellation_reason: None,
                    timeline: Vec::new(),
                },
            );
        }

        if let Some(activity) = state.orders.get_mut(&order_id) {
            match &order_event {
                OrderEvent::ItemAdded(data) => {
                    activity
                        .items
                        .insert(data.item.product_id, data.item.quantity);
                    activity.total_amount = Some(data.total_amount);
                }
                OrderEvent::ItemRemoved(data) => {
                    activity.items.remove(&data.product_id);
                    activity.total_amount = Some(data.total_amount);
                }
                OrderEvent::ItemQuantityUpdated(data) => {
                    activity.items.insert(data.product_id, data.new_quantity);
                    activity.total_amount = Some(data.total_amount);
                }
                OrderEvent::OrderConfirmed(data) => {
                    activity.total_amount = Some(data.total_amount);
                }
                OrderEvent::OrderCancelled(data) => {
                    activity.cancellation_reason = Some(data.reason.clone());
                }
                OrderEvent::PaymentCompleted(data) => {
                    activity.payment_status = PaymentStatus::Completed;
                    activity.payment_id = Some(data.payment_id.clone());
                }
                OrderEvent::PaymentFailed(_) => {
                    activity.payment_status = PaymentStatus::Failed;
                }
                OrderEvent::OrderRefunded(_) => {
                    activity.payment_status = PaymentStatus::Refunded;
                }
                _ => {}
            }

            if let Some(status) = order_event.resulting_status() {
                activity.status = status;
            }

            activity.timeline.push(ActivityEntry {
                sequence: event.sequence,
                event_type: event.event_type.clone(),
                status: activity.status,
                payment_status: activity.payment_status,
                at: event.timestamp,
            });
        }

        state.position = state.position.advance(event.sequence);
        Ok(())
    }

    async fn position(&self) -> SubscriberPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = ActivityState::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::Version;
    use domain::{Address, Currency, DomainEvent, OrderNumberPrefix};

    fn address() -> Address {
        Address::new("1 Road", "Manama", "", "", "BH").unwrap()
    }

    fn order(user_id: UserId, sequence: u32) -> Order {
        Order::create(
            OrderNumber::new(OrderNumberPrefix::Order, 2026, sequence).unwrap(),
            user_id,
            Currency::new("BHD").unwrap(),
            address(),
            address(),
        )
    }

    async fn feed(view: &OrderActivityView, order: &mut Order, next_sequence: &mut i64) {
        for event in order.take_events() {
            *next_sequence += 1;
            let mut envelope = EventEnvelope::new(
                order.id(),
                Order::aggregate_type(),
                event.event_type(),
                Version::first(),
                &event,
            )
            .unwrap();
            envelope.sequence = *next_sequence;
            view.handle(&envelope).await.unwrap();
        }
    }

    #[tokio::test]
    async fn tracks_lifecycle_timeline() {
        let view = OrderActivityView::new();
        let mut seq = 0;
        let product = ProductId::new();
        let mut order = order(UserId::new(), 1);

        order
            .add_item(product, "Widget", 2, Money::parse("100", "BHD").unwrap())
            .unwrap();
        order.confirm().unwrap();
        order.mark_payment_completed("pi_123").unwrap();
        order.start_processing().unwrap();
        order.ship().unwrap();
        feed(&view, &mut order, &mut seq).await;

        let activity = view.get(order.id()).await.unwrap();
        assert_eq!(activity.status, OrderStatus::Shipped);
        assert_eq!(activity.payment_status, PaymentStatus::Completed);
        assert_eq!(activity.payment_id.as_deref(), Some("pi_123"));
        assert_eq!(activity.total_quantity(), 2);
        assert_eq!(
            activity.total_amount,
            Some(Money::parse("200", "BHD").unwrap())
        );

        let steps: Vec<_> = activity
            .timeline
            .iter()
            .map(|e| e.event_type.as_str())
            .collect();
        assert_eq!(
            steps,
            vec![
                "OrderCreated",
                "ItemAdded",
                "OrderConfirmed",
                "PaymentCompleted",
                "ProcessingStarted",
                "OrderShipped",
            ]
        );
        assert_eq!(activity.timeline[2].status, OrderStatus::Confirmed);
        assert_eq!(view.count_by_status(OrderStatus::Shipped).await, 1);
    }

    #[tokio::test]
    async fn cancellation_records_reason() {
        let view = OrderActivityView::new();
        let mut seq = 0;
        let mut order = order(UserId::new(), 1);
        order.cancel("changed my mind").unwrap();
        feed(&view, &mut order, &mut seq).await;

        let activity = view.get(order.id()).await.unwrap();
        assert_eq!(activity.status, OrderStatus::Cancelled);
        assert_eq!(
            activity.cancellation_reason.as_deref(),
            Some("changed my mind")
        );
    }

    #[tokio::test]
    async fn refund_closes_order() {
        let view = OrderActivityView::new();
        let mut seq = 0;
        let mut order = order(UserId::new(), 1);
        order.mark_payment_completed("pi_9").unwrap();
        order.process_refund().unwrap();
        feed(&view, &mut order, &mut seq).await;

        let activity = view.get(order.id()).await.unwrap();
        assert_eq!(activity.status, OrderStatus::Refunded);
        assert_eq!(activity.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn orders_grouped_by_user() {
        let view = OrderActivityView::new();
        let mut seq = 0;
        let user = UserId::new();
        let mut first = order(user, 1);
        let mut second = order(user, 2);
        let mut other = order(UserId::new(), 3);
        feed(&view, &mut first, &mut seq).await;
        feed(&view, &mut second, &mut seq).await;
        feed(&view, &mut other, &mut seq).await;

        let orders = view.for_user(user).await;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, second.id());
        assert_eq!(view.len().await, 3);
    }

    #[tokio::test]
    async fn unknown_order_is_ignored_but_position_advances() {
        let view = OrderActivityView::new();
        let mut seq = 0;
        let mut order = order(UserId::new(), 1);
        let _created = order.take_events();
        order.cancel("late subscriber").unwrap();
        feed(&view, &mut order, &mut seq).await;

        assert!(view.is_empty().await);
        assert_eq!(view.position().await.last_sequence, 1);
    }
}

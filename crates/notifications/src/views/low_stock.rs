//! Low-stock alerting from product stock notifications.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use document_store::EventEnvelope;
use domain::{Aggregate, Product, ProductEvent, ProductId, Sku};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::subscriber::{Subscriber, SubscriberPosition};

/// Stock level at or below which a product counts as low on stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Last known stock of a product.
#[derive(Debug, Clone, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub sku: Sku,
    pub name: String,
    pub stock_quantity: u32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Raised when a product's stock falls to the threshold or below.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub sku: Sku,
    pub name: String,
    pub stock_quantity: u32,
    pub threshold: u32,
    /// Outbox sequence of the notification that raised the alert.
    pub sequence: i64,
    pub raised_at: DateTime<Utc>,
}

struct LowStockState {
    levels: HashMap<ProductId, StockLevel>,
    alerts: Vec<LowStockAlert>,
    position: SubscriberPosition,
}

impl LowStockState {
    fn new() -> Self {
        Self {
            levels: HashMap::new(),
            alerts: Vec::new(),
            position: SubscriberPosition::zero(),
        }
    }
}

/// Tracks product stock and raises an alert each time a product crosses
/// into low stock.
///
/// A product that is already low does not raise again until it has been
/// restocked above the threshold.
#[derive(Clone)]
pub struct LowStockMonitor {
    threshold: u32,
    state: Arc<RwLock<LowStockState>>,
}

impl LowStockMonitor {
    /// Creates a monitor with the default threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_LOW_STOCK_THRESHOLD)
    }

    /// Creates a monitor with a custom threshold.
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            threshold,
            state: Arc::new(RwLock::new(LowStockState::new())),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Gets the last known stock of a product.
    pub async fn stock_level(&self, product_id: ProductId) -> Option<StockLevel> {
        self.state.read().await.levels.get(&product_id).cloned()
    }

    /// Active products currently at or below the threshold, lowest stock first.
    pub async fn low_stock_products(&self) -> Vec<StockLevel> {
        let state = self.state.read().await;
        let mut low: Vec<_> = state
            .levels
            .values()
            .filter(|level| level.is_active && level.stock_quantity <= self.threshold)
            .cloned()
            .collect();
        low.sort_by(|a, b| {
            a.stock_quantity
                .cmp(&b.stock_quantity)
                .then_with(|| a.sku.cmp(&b.sku))
        });
        low
    }

    /// All alerts raised so far, oldest first.
    pub async fn alerts(&self) -> Vec<LowStockAlert> {
        self.state.read().await.alerts.clone()
    }

    /// Alerts raised for one product.
    pub async fn alerts_for(&self, product_id: ProductId) -> Vec<LowStockAlert> {
        self.state
            .read()
            .await
            .alerts
            .iter()
            .filter(|alert| alert.product_id == product_id)
            .cloned()
            .collect()
    }

    fn is_low(&self, stock: u32) -> bool {
        stock <= self.threshold
    }
}

impl Default for LowStockMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscriber for LowStockMonitor {
    fn name(&self) -> &'static str {
        "LowStockMonitor"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Product::aggregate_type() {
            let mut state = self.state.write().await;
            state.position = state.position.advance(event.sequence);
            return Ok(());
        }

        let product_event: ProductEvent = event.decode()?;
        let product_id = ProductId::from(event.aggregate_id);
        let mut state = self.state.write().await;

        // (product, previous stock, current stock) when stock moved
        let moved = match product_event {
            ProductEvent::ProductCreated(data) => {
                state.levels.insert(
                    data.product_id,
                    StockLevel {
                        product_id: data.product_id,
                        sku: data.sku,
                        name: data.name_en,
                        stock_quantity: data.stock_quantity,
                        is_active: true,
                        updated_at: data.created_at,
                    },
                );
                Some((data.product_id, None, data.stock_quantity))
            }
            ProductEvent::StockUpdated(data)
            | ProductEvent::StockReduced(data)
            | ProductEvent::StockRestored(data) => {
                let level = state
                    .levels
                    .entry(data.product_id)
                    .or_insert_with(|| StockLevel {
                        product_id: data.product_id,
                        sku: data.sku.clone(),
                        name: data.name.clone(),
                        stock_quantity: data.previous_stock,
                        is_active: true,
                        updated_at: data.changed_at,
                    });
                level.stock_quantity = data.stock_quantity;
                level.updated_at = data.changed_at;
                Some((data.product_id, Some(data.previous_stock), data.stock_quantity))
            }
            ProductEvent::DetailsUpdated(data) => {
                if let Some(level) = state.levels.get_mut(&product_id) {
                    level.name = data.details.name_en;
                    level.updated_at = data.updated_at;
                }
                None
            }
            ProductEvent::ProductActivated(data) => {
                if let Some(level) = state.levels.get_mut(&product_id) {
                    level.is_active = true;
                    level.updated_at = data.changed_at;
                }
                None
            }
            ProductEvent::ProductDeactivated(data) => {
                if let Some(level) = state.levels.get_mut(&product_id) {
                    level.is_active = false;
                    level.updated_at = data.changed_at;
                }
                None
            }
            ProductEvent::PriceChanged(_) => None,
        };

        if let Some((product_id, previous, current)) = moved {
            let crossed = self.is_low(current) && !previous.is_some_and(|p| self.is_low(p));
            if crossed && let Some(level) = state.levels.get(&product_id) {
                let alert = LowStockAlert {
                    product_id,
                    sku: level.sku.clone(),
                    name: level.name.clone(),
                    stock_quantity: current,
                    threshold: self.threshold,
                    sequence: event.sequence,
                    raised_at: event.timestamp,
                };
                tracing::warn!(
                    product_id = %product_id,
                    sku = %alert.sku,
                    stock = current,
                    threshold = self.threshold,
                    "product is low on stock"
                );
                state.alerts.push(alert);
            }
        }

        state.position = state.position.advance(event.sequence);
        Ok(())
    }

    async fn position(&self) -> SubscriberPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = LowStockState::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::Version;
    use domain::{Money, NewProduct, ProductDetails};

    fn widget(stock: u32) -> Product {
        Product::create(NewProduct {
            sku: Sku::new("wid-1").unwrap(),
            details: ProductDetails {
                name_en: "Widget".to_string(),
                ..Default::default()
            },
            price: Money::parse("100", "BHD").unwrap(),
            stock_quantity: stock,
        })
        .unwrap()
    }

    /// Drains the product's pending events into sequenced envelopes.
    fn envelopes(product: &mut Product, next_sequence: &mut i64) -> Vec<EventEnvelope> {
        product
            .take_events()
            .into_iter()
            .map(|event| {
                *next_sequence += 1;
                let mut envelope = EventEnvelope::new(
                    product.id(),
                    Product::aggregate_type(),
                    domain::DomainEvent::event_type(&event),
                    Version::first(),
                    &event,
                )
                .unwrap();
                envelope.sequence = *next_sequence;
                envelope
            })
            .collect()
    }

    async fn feed(monitor: &LowStockMonitor, events: Vec<EventEnvelope>) {
        for event in &events {
            monitor.handle(event).await.unwrap();
        }
    }

    #[tokio::test]
    async fn alert_raised_when_crossing_threshold() {
        let monitor = LowStockMonitor::new();
        let mut seq = 0;
        let mut product = widget(10);
        feed(&monitor, envelopes(&mut product, &mut seq)).await;
        assert!(monitor.alerts().await.is_empty());

        product.reduce_stock(4).unwrap();
        feed(&monitor, envelopes(&mut product, &mut seq)).await;
        assert!(monitor.alerts().await.is_empty());

        // 6 -> 5 crosses the default threshold
        product.reduce_stock(1).unwrap();
        feed(&monitor, envelopes(&mut product, &mut seq)).await;

        let alerts = monitor.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stock_quantity, 5);
        assert_eq!(alerts[0].threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(alerts[0].sequence, 3);

        let low = monitor.low_stock_products().await;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, product.product_id());
    }

    #[tokio::test]
    async fn already_low_product_does_not_alert_again() {
        let monitor = LowStockMonitor::with_threshold(3);
        let mut seq = 0;
        let mut product = widget(4);
        product.reduce_stock(2).unwrap();
        product.reduce_stock(1).unwrap();
        feed(&monitor, envelopes(&mut product, &mut seq)).await;
        assert_eq!(monitor.alerts().await.len(), 1);

        product.restore_stock(10).unwrap();
        feed(&monitor, envelopes(&mut product, &mut seq)).await;
        assert!(monitor.low_stock_products().await.is_empty());

        product.update_stock(0);
        feed(&monitor, envelopes(&mut product, &mut seq)).await;
        assert_eq!(monitor.alerts_for(product.product_id()).await.len(), 2);
    }

    #[tokio::test]
    async fn created_low_raises_alert() {
        let monitor = LowStockMonitor::new();
        let mut seq = 0;
        let mut product = widget(2);
        feed(&monitor, envelopes(&mut product, &mut seq)).await;

        assert_eq!(monitor.alerts().await.len(), 1);
        let level = monitor.stock_level(product.product_id()).await.unwrap();
        assert_eq!(level.stock_quantity, 2);
        assert_eq!(level.name, "Widget");
    }

    #[tokio::test]
    async fn inactive_products_are_not_reported_low() {
        let monitor = LowStockMonitor::new();
        let mut seq = 0;
        let mut product = widget(1);
        product.deactivate();
        feed(&monitor, envelopes(&mut product, &mut seq)).await;

        assert!(monitor.low_stock_products().await.is_empty());
        assert!(!monitor.stock_level(product.product_id()).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn non_product_notifications_advance_position() {
        let monitor = LowStockMonitor::new();
        let mut envelope = EventEnvelope::new(
            common::AggregateId::new(),
            "Order",
            "OrderShipped",
            Version::first(),
            &serde_json::json!({}),
        )
        .unwrap();
        envelope.sequence = 7;

        monitor.handle(&envelope).await.unwrap();
        assert_eq!(monitor.position().await.last_sequence, 7);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let monitor = LowStockMonitor::new();
        let mut seq = 0;
        let mut product = widget(1);
        feed(&monitor, envelopes(&mut product, &mut seq)).await;

        monitor.reset().await.unwrap();
        assert!(monitor.alerts().await.is_empty());
        assert!(monitor.stock_level(product.product_id()).await.is_none());
        assert_eq!(monitor.position().await, SubscriberPosition::zero());
    }
}

//! Integration tests: unit of work commits → Dispatcher → subscribers.

use std::sync::Arc;

use document_store::InMemoryDocumentStore;
use domain::{
    Address, Aggregate, Currency, Money, NewProduct, Order, OrderNumberPrefix, OrderRepository,
    OrderStatus, PaymentStatus, Product, ProductDetails, Sku, UnitOfWork, UserId,
};
use notifications::{Dispatcher, LowStockMonitor, OrderActivityView, Subscriber};

struct Harness {
    store: Arc<InMemoryDocumentStore>,
    dispatcher: Dispatcher<InMemoryDocumentStore>,
    low_stock: LowStockMonitor,
    activity: OrderActivityView,
}

fn setup() -> Harness {
    let store = Arc::new(InMemoryDocumentStore::new());
    let low_stock = LowStockMonitor::new();
    let activity = OrderActivityView::new();

    let mut dispatcher = Dispatcher::new(Arc::clone(&store));
    dispatcher.register(Box::new(low_stock.clone()));
    dispatcher.register(Box::new(activity.clone()));

    Harness {
        store,
        dispatcher,
        low_stock,
        activity,
    }
}

fn address() -> Address {
    Address::new("Building 10, Road 2", "Manama", "Capital", "317", "Bahrain").unwrap()
}

fn product(sku: &str, stock: u32) -> Product {
    Product::create(NewProduct {
        sku: Sku::new(sku).unwrap(),
        details: ProductDetails {
            name_en: format!("Product {sku}"),
            ..Default::default()
        },
        price: Money::parse("100", "BHD").unwrap(),
        stock_quantity: stock,
    })
    .unwrap()
}

impl Harness {
    async fn create_product(&self, sku: &str, stock: u32) -> Product {
        let mut product = product(sku, stock);
        let mut uow = UnitOfWork::new(Arc::clone(&self.store));
        uow.add(&mut product).unwrap();
        let events = uow.commit().await.unwrap();
        self.dispatcher.dispatch(&events).await.unwrap();
        product
    }

    /// Places an order and reduces stock in one commit, returning the order.
    async fn place_order(&self, product: &mut Product, quantity: u32) -> Order {
        let number = OrderRepository::new(Arc::clone(&self.store))
            .next_order_number(OrderNumberPrefix::Order, 2026)
            .await
            .unwrap();
        let mut order = Order::create(
            number,
            UserId::new(),
            Currency::new("BHD").unwrap(),
            address(),
            address(),
        );
        order
            .add_item(product.product_id(), product.name(), quantity, product.price())
            .unwrap();
        product.reduce_stock(quantity).unwrap();

        let mut uow = UnitOfWork::new(Arc::clone(&self.store));
        uow.update(product).unwrap();
        uow.add(&mut order).unwrap();
        let events = uow.commit().await.unwrap();
        self.dispatcher.dispatch(&events).await.unwrap();
        order
    }

    async fn cancel_order(&self, order: &mut Order, product: &mut Product) {
        order.cancel("customer request").unwrap();
        for item in order.items().to_vec() {
            product.restore_stock(item.quantity).unwrap();
        }
        let mut uow = UnitOfWork::new(Arc::clone(&self.store));
        uow.update(order).unwrap();
        uow.update(product).unwrap();
        let events = uow.commit().await.unwrap();
        self.dispatcher.dispatch(&events).await.unwrap();
    }
}

#[tokio::test]
async fn order_placement_feeds_both_subscribers() {
    let harness = setup();
    let mut widget = harness.create_product("WID-001", 10).await;

    let order = harness.place_order(&mut widget, 6).await;

    let activity = harness.activity.get(order.id()).await.unwrap();
    assert_eq!(activity.status, OrderStatus::Pending);
    assert_eq!(activity.payment_status, PaymentStatus::Pending);
    assert_eq!(activity.total_quantity(), 6);
    assert_eq!(activity.order_number, order.order_number());

    let level = harness
        .low_stock
        .stock_level(widget.product_id())
        .await
        .unwrap();
    assert_eq!(level.stock_quantity, 4);

    let alerts = harness.low_stock.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].product_id, widget.product_id());
    assert_eq!(alerts[0].stock_quantity, 4);
}

#[tokio::test]
async fn cancellation_restores_stock_level() {
    let harness = setup();
    let mut widget = harness.create_product("WID-001", 10).await;
    let mut order = harness.place_order(&mut widget, 8).await;
    assert_eq!(harness.low_stock.low_stock_products().await.len(), 1);

    harness.cancel_order(&mut order, &mut widget).await;

    assert!(harness.low_stock.low_stock_products().await.is_empty());
    assert_eq!(
        harness
            .low_stock
            .stock_level(widget.product_id())
            .await
            .unwrap()
            .stock_quantity,
        10
    );
    let activity = harness.activity.get(order.id()).await.unwrap();
    assert_eq!(activity.status, OrderStatus::Cancelled);
    assert_eq!(activity.cancellation_reason.as_deref(), Some("customer request"));
}

#[tokio::test]
async fn late_subscriber_catches_up_from_outbox() {
    let harness = setup();
    let mut widget = harness.create_product("WID-001", 10).await;
    let first = harness.place_order(&mut widget, 2).await;
    let second = harness.place_order(&mut widget, 5).await;

    let late_activity = OrderActivityView::new();
    let late_low_stock = LowStockMonitor::with_threshold(3);
    let mut dispatcher = Dispatcher::new(Arc::clone(&harness.store));
    dispatcher.register(Box::new(late_activity.clone()));
    dispatcher.register(Box::new(late_low_stock.clone()));
    dispatcher.run_catch_up().await.unwrap();

    assert_eq!(late_activity.len().await, 2);
    assert!(late_activity.get(first.id()).await.is_some());
    assert!(late_activity.get(second.id()).await.is_some());
    assert_eq!(late_low_stock.alerts().await.len(), 1);
    assert_eq!(
        late_low_stock.position().await.last_sequence,
        harness.store.outbox_len().await as i64
    );
}

#[tokio::test]
async fn rebuild_replays_to_same_state() {
    let harness = setup();
    let mut widget = harness.create_product("WID-001", 10).await;
    let mut order = harness.place_order(&mut widget, 7).await;
    harness.cancel_order(&mut order, &mut widget).await;

    let alerts_before = harness.low_stock.alerts().await.len();
    let timeline_before = harness.activity.get(order.id()).await.unwrap().timeline.len();

    harness.dispatcher.rebuild_all().await.unwrap();

    assert_eq!(harness.low_stock.alerts().await.len(), alerts_before);
    assert_eq!(
        harness.activity.get(order.id()).await.unwrap().timeline.len(),
        timeline_before
    );
}
